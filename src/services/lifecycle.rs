// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation lifecycle engine.
//!
//! ```text
//! pending -> assigned -> accepted -> in_progress -> completed
//!    \___________\___________\___________\_______-> cancelled
//! ```
//!
//! Planning a transition is pure: [`plan_transition`] looks at the donation
//! as the store returned it and decides the row to write, or why not.
//! [`LifecycleEngine::apply`] then commits the plan with a conditional
//! write guarded on the status and assignment it planned against, so a
//! decision is never applied to a row that changed underneath it.

use crate::db::{ConditionalWrite, DonationGuard, RecordStore};
use crate::error::{AppError, Result};
use crate::models::pickup_event::PICKUP_COMPLETED;
use crate::models::{Donation, DonationStatus, NewDonation, PickupEvent, Role};
use crate::services::assignment;
use crate::services::session::{Actor, UserContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use validator::Validate;

/// Most proof photos accepted with one completion.
pub const MAX_PROOF_IMAGES: usize = 3;

/// Conditional writes tried before a contended transition gives up.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Notes recorded on a pickup event when the volunteer leaves none.
pub const DEFAULT_COMPLETION_NOTES: &str = "Pickup completed successfully";

/// Evidence supplied when completing a pickup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionProof {
    pub proof_images: Vec<String>,
    pub signature_data: Option<String>,
    pub notes: Option<String>,
}

/// A requested status change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// pending -> assigned, when the donation is shown to volunteers.
    Broadcast,
    /// pending/assigned -> accepted by the requesting volunteer.
    Claim,
    /// accepted -> in_progress.
    Start,
    /// in_progress -> completed.
    Complete(CompletionProof),
    /// any non-terminal -> cancelled.
    Cancel,
}

impl Transition {
    pub fn target(&self) -> DonationStatus {
        match self {
            Transition::Broadcast => DonationStatus::Assigned,
            Transition::Claim => DonationStatus::Accepted,
            Transition::Start => DonationStatus::InProgress,
            Transition::Complete(_) => DonationStatus::Completed,
            Transition::Cancel => DonationStatus::Cancelled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Broadcast => "broadcast",
            Transition::Claim => "claim",
            Transition::Start => "start",
            Transition::Complete(_) => "complete",
            Transition::Cancel => "cancel",
        }
    }

    /// Statuses this edge may leave from.
    fn sources(&self) -> &'static [DonationStatus] {
        match self {
            Transition::Broadcast => &[DonationStatus::Pending],
            Transition::Claim => &DonationStatus::CLAIMABLE,
            Transition::Start => &[DonationStatus::Accepted],
            Transition::Complete(_) => &[DonationStatus::InProgress],
            Transition::Cancel => &[
                DonationStatus::Pending,
                DonationStatus::Assigned,
                DonationStatus::Accepted,
                DonationStatus::InProgress,
            ],
        }
    }
}

/// What a validated transition asks the store to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Already at the target; nothing to write.
    NoOp,
    Write {
        guard: DonationGuard,
        updated: Donation,
        pickup_event: Option<PickupEvent>,
    },
}

impl Plan {
    /// Write plan guarded on `current` exactly as observed.
    pub(crate) fn write(current: &Donation, updated: Donation) -> Self {
        Plan::Write {
            guard: DonationGuard::observed(current),
            updated,
            pickup_event: None,
        }
    }
}

/// Result of applying a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// The row after the transition
    pub donation: Donation,
    /// Set only when a completion wrote an audit record
    pub pickup_event: Option<PickupEvent>,
    /// False for a no-op
    pub changed: bool,
}

fn require_user(actor: &Actor) -> Result<&UserContext> {
    actor
        .user()
        .ok_or_else(|| AppError::Unauthorized("a signed-in user is required".to_string()))
}

/// Check that `actor` may take `transition` on `donation`.
fn authorize(donation: &Donation, actor: &Actor, transition: &Transition) -> Result<()> {
    match transition {
        Transition::Broadcast => match actor {
            Actor::System => Ok(()),
            Actor::User(_) => Err(AppError::Unauthorized(
                "only the system may broadcast a donation".to_string(),
            )),
        },
        Transition::Claim => require_user(actor)?.require_role(Role::Volunteer),
        Transition::Start | Transition::Complete(_) => {
            let user = require_user(actor)?;
            if donation.is_assigned_to(&user.user_id) {
                Ok(())
            } else {
                Err(AppError::Unauthorized(
                    "only the assigned volunteer may update this pickup".to_string(),
                ))
            }
        }
        Transition::Cancel => {
            let user = require_user(actor)?;
            if donation.donor_id == user.user_id || user.is_admin() {
                Ok(())
            } else {
                Err(AppError::Unauthorized(
                    "only the donor or an admin may cancel".to_string(),
                ))
            }
        }
    }
}

/// Decide what `transition` does to `current`.
///
/// `pickup_event_id` is only called for a completion that will be written.
pub fn plan_transition(
    current: &Donation,
    actor: &Actor,
    transition: &Transition,
    now: DateTime<Utc>,
    pickup_event_id: impl FnOnce() -> String,
) -> Result<Plan> {
    if let Transition::Claim = transition {
        let volunteer = require_user(actor)?;
        volunteer.require_role(Role::Volunteer)?;
        return assignment::plan_claim(current, volunteer, now);
    }

    let target = transition.target();

    if current.status == target {
        authorize(current, actor, transition)?;
        return Ok(Plan::NoOp);
    }

    if !transition.sources().contains(&current.status) {
        return Err(AppError::InvalidTransition(format!(
            "cannot move donation from {} to {}",
            current.status, target
        )));
    }

    authorize(current, actor, transition)?;

    let mut updated = current.clone();
    updated.status = target;
    updated.updated_at = now;

    match transition {
        Transition::Cancel => {
            updated.assigned_volunteer_id = None;
            Ok(Plan::write(current, updated))
        }
        Transition::Complete(proof) => {
            let event = completion_event(current, proof, now, pickup_event_id)?;
            Ok(Plan::Write {
                guard: DonationGuard::observed(current),
                updated,
                pickup_event: Some(event),
            })
        }
        _ => Ok(Plan::write(current, updated)),
    }
}

fn completion_event(
    current: &Donation,
    proof: &CompletionProof,
    now: DateTime<Utc>,
    pickup_event_id: impl FnOnce() -> String,
) -> Result<PickupEvent> {
    let images: Vec<&String> = proof
        .proof_images
        .iter()
        .filter(|url| !url.trim().is_empty())
        .collect();

    if images.is_empty() {
        return Err(AppError::InvalidTransition(
            "at least one proof image is required to complete a pickup".to_string(),
        ));
    }
    if images.len() > MAX_PROOF_IMAGES {
        return Err(AppError::BadRequest(format!(
            "at most {} proof images may be attached",
            MAX_PROOF_IMAGES
        )));
    }

    // Reachable only from in_progress, which always carries a volunteer.
    let volunteer_id = current
        .assigned_volunteer_id
        .clone()
        .ok_or_else(|| AppError::InvalidTransition("pickup has no assigned volunteer".to_string()))?;

    Ok(PickupEvent {
        id: pickup_event_id(),
        donation_id: current.id.clone(),
        volunteer_id,
        status: PICKUP_COMPLETED.to_string(),
        proof_image: images.first().map(|url| url.to_string()),
        signature_data: proof.signature_data.clone(),
        notes: Some(
            proof
                .notes
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COMPLETION_NOTES.to_string()),
        ),
        created_at: now,
    })
}

/// Validates and commits donation state changes.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn RecordStore>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Schedule a new pickup. Only donors create donations.
    pub async fn create_donation(
        &self,
        donor: &UserContext,
        details: NewDonation,
    ) -> Result<Donation> {
        donor.require_role(Role::Donor)?;

        details
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid donation: {}", e)))?;
        if details.item_category.trim().is_empty() || details.pickup_address.trim().is_empty() {
            return Err(AppError::BadRequest(
                "item category and pickup address are required".to_string(),
            ));
        }

        let donation = Donation::new(
            uuid::Uuid::new_v4().to_string(),
            donor.user_id.clone(),
            details,
            Utc::now(),
        );
        self.store.insert_donation(&donation).await?;

        tracing::info!(
            donation_id = %donation.id,
            donor_id = %donation.donor_id,
            category = %donation.item_category,
            "Donation scheduled"
        );
        Ok(donation)
    }

    /// Fetch a donation or fail with `NotFound`.
    pub async fn load(&self, donation_id: &str) -> Result<Donation> {
        self.store
            .get_donation(donation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Donation {}", donation_id)))
    }

    /// Validate `transition` against the stored row and commit it.
    ///
    /// When the conditional write loses to a concurrent change, the
    /// transition is planned again against the row that won, so the error
    /// reflects what the donation holds now.
    pub async fn apply(
        &self,
        donation_id: &str,
        actor: &Actor,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let mut current = self.load(donation_id).await?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let plan = plan_transition(&current, actor, &transition, Utc::now(), || {
                uuid::Uuid::new_v4().to_string()
            })?;

            let (guard, updated, pickup_event) = match plan {
                Plan::NoOp => {
                    tracing::debug!(
                        donation_id,
                        transition = transition.name(),
                        status = %current.status,
                        "Transition is a no-op"
                    );
                    return Ok(TransitionOutcome {
                        donation: current,
                        pickup_event: None,
                        changed: false,
                    });
                }
                Plan::Write {
                    guard,
                    updated,
                    pickup_event,
                } => (guard, updated, pickup_event),
            };

            match self
                .store
                .update_donation_if(&guard, &updated, pickup_event.as_ref())
                .await?
            {
                ConditionalWrite::Applied => {
                    tracing::info!(
                        donation_id,
                        actor = actor.label(),
                        from = %current.status,
                        to = %updated.status,
                        "Donation transitioned"
                    );
                    return Ok(TransitionOutcome {
                        donation: updated,
                        pickup_event,
                        changed: true,
                    });
                }
                ConditionalWrite::Rejected(Some(row)) => {
                    tracing::debug!(
                        donation_id,
                        transition = transition.name(),
                        attempt,
                        now = %row.status,
                        "Conditional write rejected, replanning"
                    );
                    current = row;
                }
                ConditionalWrite::Rejected(None) => {
                    return Err(AppError::NotFound(format!("Donation {}", donation_id)));
                }
            }
        }

        if let Transition::Claim = transition {
            Err(AppError::ClaimConflict(format!(
                "donation {} was already taken",
                donation_id
            )))
        } else {
            Err(AppError::InvalidTransition(format!(
                "donation {} changed concurrently (now {})",
                donation_id, current.status
            )))
        }
    }
}
