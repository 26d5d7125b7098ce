// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification dispatcher.
//!
//! Runs off the change feed, independent of the request that caused the
//! change. A status change produces at most one SMS per affected party.
//! Send failures are logged and never touch the committed transition.

use crate::db::RecordStore;
use crate::feed::{ChangeEvent, ChangeFeed, Delivery, EventType, Table};
use crate::models::{Donation, DonationStatus, Profile};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const BRAND: &str = "DonateConnect";

/// A failed delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMS gateway request failed: {0}")]
    Transport(String),

    #[error("SMS gateway returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub message: String,
}

/// Delivery channel for outgoing messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError>;
}

/// HTTP SMS gateway client.
///
/// POSTs `{"to": ..., "message": ...}` as JSON with an optional bearer
/// token.
#[derive(Clone)]
pub struct SmsGateway {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl SmsGateway {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            token,
        }
    }
}

#[async_trait]
impl Notifier for SmsGateway {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let mut request = self.http.post(&self.url).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected { status, body })
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        tracing::info!(to = %message.to, message = %message.message, "SMS (not sent, no gateway configured)");
        Ok(())
    }
}

fn donor_text(donation: &Donation, volunteer: Option<&Profile>) -> Option<String> {
    let outcome = match donation.status {
        DonationStatus::Pending => return None,
        DonationStatus::Assigned => {
            "has been assigned to a volunteer. They will contact you soon.".to_string()
        }
        DonationStatus::Accepted => format!(
            "has been accepted by {}.",
            volunteer.map_or("a volunteer", |v| v.full_name.as_str())
        ),
        DonationStatus::InProgress => {
            "pickup is in progress. The volunteer is on their way!".to_string()
        }
        DonationStatus::Completed => {
            "has been successfully picked up. Thank you for your generosity!".to_string()
        }
        DonationStatus::Cancelled => "has been cancelled.".to_string(),
    };
    Some(format!(
        "{}: Your {} donation {}",
        BRAND, donation.item_category, outcome
    ))
}

fn volunteer_text(donation: &Donation, donor: Option<&Profile>) -> String {
    format!(
        "{}: New pickup assigned - {} from {}. Address: {}. Date: {}",
        BRAND,
        donation.item_category,
        donor.map_or("a donor", |d| d.full_name.as_str()),
        donation.pickup_address,
        donation.preferred_date.format("%-m/%-d/%Y")
    )
}

/// Messages owed for the change `old -> new`.
///
/// Empty unless the status actually changed.
pub fn compose_messages(
    old: &Donation,
    new: &Donation,
    donor: Option<&Profile>,
    volunteer: Option<&Profile>,
) -> Vec<OutgoingMessage> {
    if old.status == new.status {
        return Vec::new();
    }

    let mut messages = Vec::new();

    if let Some(phone) = donor.and_then(|d| d.phone.as_deref()) {
        if let Some(message) = donor_text(new, volunteer) {
            messages.push(OutgoingMessage {
                to: phone.to_string(),
                message,
            });
        }
    }

    if matches!(new.status, DonationStatus::Assigned | DonationStatus::Accepted) {
        if let Some(phone) = volunteer.and_then(|v| v.phone.as_deref()) {
            messages.push(OutgoingMessage {
                to: phone.to_string(),
                message: volunteer_text(new, donor),
            });
        }
    }

    messages
}

/// Sends transition messages for donation updates seen on the feed.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn profile(&self, id: &str) -> Option<Profile> {
        match self.store.get_profile(id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(profile_id = id, error = %e, "Profile lookup failed for notification");
                None
            }
        }
    }

    /// Handle one change event. Returns how many messages were delivered.
    pub async fn handle(&self, event: &ChangeEvent) -> usize {
        let (Some(old), Some(new)) = (event.old_donation(), event.new_donation()) else {
            return 0;
        };
        if old.status == new.status {
            return 0;
        }

        let donor = self.profile(&new.donor_id).await;
        let volunteer = match new.assigned_volunteer_id.as_deref() {
            Some(id) => self.profile(id).await,
            None => None,
        };

        let messages = compose_messages(old, new, donor.as_ref(), volunteer.as_ref());
        let mut delivered = 0;
        for message in &messages {
            match self.notifier.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    donation_id = %new.id,
                    status = %new.status,
                    error = %e,
                    "Notification failed"
                ),
            }
        }

        tracing::debug!(
            donation_id = %new.id,
            status = %new.status,
            composed = messages.len(),
            delivered,
            "Notifications dispatched"
        );
        delivered
    }

    /// Run the dispatcher on its own task until the token is cancelled.
    pub fn spawn(self, feed: &ChangeFeed) -> (JoinHandle<()>, CancellationToken) {
        let mut subscription = feed.subscribe(&[Table::Donations], &[EventType::Update]);
        let token = subscription.cancellation_token();

        let handle = tokio::spawn(async move {
            while let Some(delivery) = subscription.next().await {
                match delivery {
                    Delivery::Event(event) => {
                        self.handle(&event).await;
                    }
                    Delivery::Missed(missed) => {
                        tracing::warn!(missed, "Notification dispatcher dropped change events");
                    }
                }
            }
            tracing::info!("Notification dispatcher stopped");
        });

        (handle, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TimeSlot};
    use chrono::{NaiveDate, Utc};

    fn donation(status: DonationStatus) -> Donation {
        let now = Utc::now();
        Donation {
            id: "d1".to_string(),
            donor_id: "donor".to_string(),
            item_category: "Books".to_string(),
            item_description: None,
            item_quantity: 3,
            pickup_address: "1 Main St".to_string(),
            preferred_date: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
            preferred_time_slot: TimeSlot::Morning,
            notes: None,
            location: None,
            images: vec![],
            status,
            assigned_volunteer_id: status.requires_volunteer().then(|| "vol".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn person(id: &str, name: &str, phone: Option<&str>) -> Profile {
        Profile {
            id: id.to_string(),
            full_name: name.to_string(),
            phone: phone.map(str::to_string),
            address: None,
            location: None,
            role: Role::Donor,
            verified: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_accepted_messages_both_parties() {
        let donor = person("donor", "Dana Smith", Some("555-0100"));
        let volunteer = person("vol", "Val Jones", Some("555-0199"));

        let messages = compose_messages(
            &donation(DonationStatus::Assigned),
            &donation(DonationStatus::Accepted),
            Some(&donor),
            Some(&volunteer),
        );

        assert_eq!(
            messages,
            vec![
                OutgoingMessage {
                    to: "555-0100".to_string(),
                    message: "DonateConnect: Your Books donation has been accepted by Val Jones."
                        .to_string(),
                },
                OutgoingMessage {
                    to: "555-0199".to_string(),
                    message: "DonateConnect: New pickup assigned - Books from Dana Smith. Address: 1 Main St. Date: 7/4/2024"
                        .to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_unchanged_status_sends_nothing() {
        let donor = person("donor", "Dana", Some("555-0100"));
        let d = donation(DonationStatus::InProgress);
        assert!(compose_messages(&d, &d, Some(&donor), None).is_empty());
    }

    #[test]
    fn test_missing_phone_skips_recipient() {
        let donor = person("donor", "Dana", None);
        let messages = compose_messages(
            &donation(DonationStatus::InProgress),
            &donation(DonationStatus::Completed),
            Some(&donor),
            None,
        );
        assert!(messages.is_empty());
    }

    #[test]
    fn test_cancel_notifies_donor_only() {
        let donor = person("donor", "Dana", Some("555-0100"));
        let volunteer = person("vol", "Val", Some("555-0199"));
        let messages = compose_messages(
            &donation(DonationStatus::Accepted),
            &donation(DonationStatus::Cancelled),
            Some(&donor),
            Some(&volunteer),
        );
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].message,
            "DonateConnect: Your Books donation has been cancelled."
        );
    }
}
