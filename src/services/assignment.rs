// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Assignment coordinator: first come, first claim.
//!
//! A claim is planned against the row the volunteer saw and committed as a
//! compare-and-swap on `(status, assigned_volunteer_id)`. Of any number of
//! concurrent claims on one donation exactly one write can match the
//! unassigned guard; the rest come back as `ClaimConflict` and are not
//! retried.

use crate::error::{AppError, Result};
use crate::models::{Donation, DonationStatus};
use crate::services::lifecycle::{LifecycleEngine, Plan, Transition};
use crate::services::session::{Actor, UserContext};
use chrono::{DateTime, Utc};

/// Decide what a claim by `volunteer` does to `current`.
pub fn plan_claim(current: &Donation, volunteer: &UserContext, now: DateTime<Utc>) -> Result<Plan> {
    match (current.status, current.assigned_volunteer_id.as_deref()) {
        (status, None) if status.is_claimable() => {
            let mut updated = current.clone();
            updated.status = DonationStatus::Accepted;
            updated.assigned_volunteer_id = Some(volunteer.user_id.clone());
            updated.updated_at = now;
            Ok(Plan::write(current, updated))
        }
        (DonationStatus::Accepted, Some(holder)) if holder == volunteer.user_id => Ok(Plan::NoOp),
        (status, Some(holder)) if status.requires_volunteer() && holder != volunteer.user_id => {
            Err(AppError::ClaimConflict(format!(
                "donation {} was already taken",
                current.id
            )))
        }
        (status, _) => Err(AppError::InvalidTransition(format!(
            "cannot claim a donation that is {}",
            status
        ))),
    }
}

/// Entry point for volunteer claims.
#[derive(Clone)]
pub struct AssignmentCoordinator {
    engine: LifecycleEngine,
}

impl AssignmentCoordinator {
    pub fn new(engine: LifecycleEngine) -> Self {
        Self { engine }
    }

    /// Claim `donation_id` for `volunteer`. Returns the accepted donation.
    ///
    /// A lost race surfaces as `ClaimConflict`; the caller should reload its
    /// view and show the donation as taken.
    pub async fn claim(&self, donation_id: &str, volunteer: &UserContext) -> Result<Donation> {
        let actor = Actor::User(volunteer.clone());
        match self.engine.apply(donation_id, &actor, Transition::Claim).await {
            Ok(outcome) => {
                if outcome.changed {
                    tracing::info!(
                        donation_id,
                        volunteer_id = %volunteer.user_id,
                        "Donation claimed"
                    );
                }
                Ok(outcome.donation)
            }
            Err(AppError::ClaimConflict(msg)) => {
                tracing::warn!(
                    donation_id,
                    volunteer_id = %volunteer.user_id,
                    "Claim lost to another volunteer"
                );
                Err(AppError::ClaimConflict(msg))
            }
            Err(e) => Err(e),
        }
    }
}
