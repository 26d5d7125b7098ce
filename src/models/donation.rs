// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation model and its status lifecycle values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Lifecycle status of a donation.
///
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DonationStatus {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl DonationStatus {
    pub const ALL: [DonationStatus; 6] = [
        DonationStatus::Pending,
        DonationStatus::Assigned,
        DonationStatus::Accepted,
        DonationStatus::InProgress,
        DonationStatus::Completed,
        DonationStatus::Cancelled,
    ];

    /// Statuses shown in the volunteer "available" queue.
    pub const CLAIMABLE: [DonationStatus; 2] = [DonationStatus::Pending, DonationStatus::Assigned];

    pub fn as_str(self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Assigned => "assigned",
            DonationStatus::Accepted => "accepted",
            DonationStatus::InProgress => "in_progress",
            DonationStatus::Completed => "completed",
            DonationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DonationStatus::Completed | DonationStatus::Cancelled)
    }

    /// Whether a donation in this status must carry an assigned volunteer.
    pub fn requires_volunteer(self) -> bool {
        matches!(
            self,
            DonationStatus::Accepted | DonationStatus::InProgress | DonationStatus::Completed
        )
    }

    pub fn is_claimable(self) -> bool {
        Self::CLAIMABLE.contains(&self)
    }

    /// Position along the forward path; cancellation ranks last.
    pub fn progress_rank(self) -> u8 {
        match self {
            DonationStatus::Pending => 0,
            DonationStatus::Assigned => 1,
            DonationStatus::Accepted => 2,
            DonationStatus::InProgress => 3,
            DonationStatus::Completed => 4,
            DonationStatus::Cancelled => 5,
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DonationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown donation status '{}'", s))
    }
}

/// Preferred pickup time band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum TimeSlot {
    #[serde(rename = "Morning (9 AM - 12 PM)")]
    Morning,
    #[serde(rename = "Afternoon (12 PM - 3 PM)")]
    Afternoon,
    #[serde(rename = "Evening (3 PM - 6 PM)")]
    Evening,
    #[serde(rename = "Late Evening (6 PM - 9 PM)")]
    LateEvening,
}

impl TimeSlot {
    pub fn label(self) -> &'static str {
        match self {
            TimeSlot::Morning => "Morning (9 AM - 12 PM)",
            TimeSlot::Afternoon => "Afternoon (12 PM - 3 PM)",
            TimeSlot::Evening => "Evening (3 PM - 6 PM)",
            TimeSlot::LateEvening => "Late Evening (6 PM - 9 PM)",
        }
    }
}

/// WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Stored donation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Donation {
    /// Opaque unique ID (also used as document ID)
    pub id: String,
    /// Profile ID of the donor who scheduled the pickup
    pub donor_id: String,
    /// Free-form category label ("Books", "Clothing", ...)
    pub item_category: String,
    pub item_description: Option<String>,
    /// Always at least 1
    pub item_quantity: u32,
    pub pickup_address: String,
    pub preferred_date: NaiveDate,
    pub preferred_time_slot: TimeSlot,
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
    /// Item image URLs supplied by the donor
    #[serde(default)]
    pub images: Vec<String>,
    pub status: DonationStatus,
    /// Set exactly while status is accepted, in_progress or completed
    pub assigned_volunteer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// Build a fresh `pending` donation for `donor_id`.
    pub fn new(id: String, donor_id: String, details: NewDonation, now: DateTime<Utc>) -> Self {
        Self {
            id,
            donor_id,
            item_category: details.item_category.trim().to_string(),
            item_description: details.item_description,
            item_quantity: details.item_quantity,
            pickup_address: details.pickup_address.trim().to_string(),
            preferred_date: details.preferred_date,
            preferred_time_slot: details.preferred_time_slot,
            notes: details.notes.filter(|n| !n.trim().is_empty()),
            location: details.location,
            images: details.images,
            status: DonationStatus::Pending,
            assigned_volunteer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the assignment invariant: a volunteer is recorded iff the
    /// status requires one.
    pub fn assignment_is_consistent(&self) -> bool {
        self.assigned_volunteer_id.is_some() == self.status.requires_volunteer()
    }

    pub fn is_assigned_to(&self, volunteer_id: &str) -> bool {
        self.assigned_volunteer_id.as_deref() == Some(volunteer_id)
    }
}

/// Donor-supplied fields for scheduling a new pickup.
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct NewDonation {
    #[validate(length(min = 1, max = 100))]
    pub item_category: String,
    #[validate(length(max = 2000))]
    pub item_description: Option<String>,
    #[validate(range(min = 1, max = 10000))]
    pub item_quantity: u32,
    #[validate(length(min = 1, max = 500))]
    pub pickup_address: String,
    pub preferred_date: NaiveDate,
    pub preferred_time_slot: TimeSlot,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    #[validate(length(max = 5))]
    pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_uses_snake_case() {
        let json = serde_json::to_string(&DonationStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: DonationStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, DonationStatus::Cancelled);
    }

    #[test]
    fn test_status_from_str_rejects_unknown() {
        assert_eq!(
            "in_progress".parse::<DonationStatus>(),
            Ok(DonationStatus::InProgress)
        );
        assert!("picked_up".parse::<DonationStatus>().is_err());
    }

    #[test]
    fn test_time_slot_labels_round_trip() {
        let parsed: TimeSlot = serde_json::from_str("\"Late Evening (6 PM - 9 PM)\"").unwrap();
        assert_eq!(parsed, TimeSlot::LateEvening);
        assert_eq!(
            serde_json::to_string(&TimeSlot::Afternoon).unwrap(),
            format!("\"{}\"", TimeSlot::Afternoon.label())
        );
    }

    #[test]
    fn test_requires_volunteer() {
        let with: Vec<_> = DonationStatus::ALL
            .into_iter()
            .filter(|s| s.requires_volunteer())
            .collect();
        assert_eq!(
            with,
            vec![
                DonationStatus::Accepted,
                DonationStatus::InProgress,
                DonationStatus::Completed
            ]
        );
    }
}
