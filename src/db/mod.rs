//! Record store layer.
//!
//! The store exclusively owns persisted entity state. Every donation write
//! goes through [`RecordStore::update_donation_if`], a single-row
//! compare-and-swap against the pre-image the caller observed.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryStore;

use crate::error::AppError;
use crate::models::{Donation, DonationStatus, PickupEvent, Profile, UserRole};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const DONATIONS: &str = "donations";
    pub const PROFILES: &str = "profiles";
    pub const USER_ROLES: &str = "user_roles";
    pub const PICKUP_EVENTS: &str = "pickup_events";
}

/// The part of a donation row a conditional write is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationGuard {
    pub status: DonationStatus,
    pub assigned_volunteer_id: Option<String>,
}

impl DonationGuard {
    /// Guard matching the row exactly as `donation` shows it.
    pub fn observed(donation: &Donation) -> Self {
        Self {
            status: donation.status,
            assigned_volunteer_id: donation.assigned_volunteer_id.clone(),
        }
    }

    pub fn matches(&self, donation: &Donation) -> bool {
        donation.status == self.status
            && donation.assigned_volunteer_id == self.assigned_volunteer_id
    }
}

/// Result of a conditional donation write.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalWrite {
    Applied,
    /// The guard did not match; carries the row as it is now, if any.
    Rejected(Option<Donation>),
}

/// Filtered select over donations. Results are ordered by `created_at`
/// descending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonationQuery {
    pub donor_id: Option<String>,
    pub assigned_volunteer_id: Option<String>,
    pub statuses: Option<Vec<DonationStatus>>,
    pub limit: Option<usize>,
}

impl DonationQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn donor(mut self, donor_id: &str) -> Self {
        self.donor_id = Some(donor_id.to_string());
        self
    }

    pub fn volunteer(mut self, volunteer_id: &str) -> Self {
        self.assigned_volunteer_id = Some(volunteer_id.to_string());
        self
    }

    pub fn status_in(mut self, statuses: &[DonationStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `donation` passes the equality/`in` filters (ignores limit).
    pub fn matches(&self, donation: &Donation) -> bool {
        self.donor_id
            .as_deref()
            .is_none_or(|id| donation.donor_id == id)
            && self
                .assigned_volunteer_id
                .as_deref()
                .is_none_or(|id| donation.is_assigned_to(id))
            && self
                .statuses
                .as_ref()
                .is_none_or(|statuses| statuses.contains(&donation.status))
    }

    /// Apply filters, newest-first ordering and limit to an unordered set.
    pub fn select<I>(&self, donations: I) -> Vec<Donation>
    where
        I: IntoIterator<Item = Donation>,
    {
        let mut selected: Vec<Donation> = donations.into_iter().filter(|d| self.matches(d)).collect();
        sort_newest_first(&mut selected);
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Newest first; ties broken by ID so ordering is total.
pub fn sort_newest_first(donations: &mut [Donation]) {
    donations.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Access pattern the application needs from the backing store.
///
/// Implementations publish a change event for every committed write.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ─── Donations ───────────────────────────────────────────────

    async fn get_donation(&self, id: &str) -> Result<Option<Donation>, AppError>;

    async fn list_donations(&self, query: &DonationQuery) -> Result<Vec<Donation>, AppError>;

    async fn insert_donation(&self, donation: &Donation) -> Result<(), AppError>;

    /// Replace the donation row with `updated` only if the stored row still
    /// matches `guard`. When `pickup_event` is given it is inserted in the
    /// same atomic write.
    async fn update_donation_if(
        &self,
        guard: &DonationGuard,
        updated: &Donation,
        pickup_event: Option<&PickupEvent>,
    ) -> Result<ConditionalWrite, AppError>;

    // ─── Profiles & Roles ────────────────────────────────────────

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError>;

    /// Role entries for one user, oldest first.
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<UserRole>, AppError>;

    async fn list_user_roles(&self) -> Result<Vec<UserRole>, AppError>;

    async fn insert_user_role(&self, role: &UserRole) -> Result<(), AppError>;

    // ─── Pickup Events ───────────────────────────────────────────

    async fn pickup_events_for(&self, donation_id: &str) -> Result<Vec<PickupEvent>, AppError>;

    async fn list_pickup_events(&self) -> Result<Vec<PickupEvent>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn donation(id: &str, donor: &str, status: DonationStatus, minutes: i64) -> Donation {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes);
        Donation {
            id: id.to_string(),
            donor_id: donor.to_string(),
            item_category: "Clothing".to_string(),
            item_description: None,
            item_quantity: 1,
            pickup_address: "9 Oak Ave".to_string(),
            preferred_date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            preferred_time_slot: TimeSlot::Morning,
            notes: None,
            location: None,
            images: vec![],
            status,
            assigned_volunteer_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_query_orders_newest_first_and_limits() {
        let rows = vec![
            donation("old", "a", DonationStatus::Pending, 0),
            donation("new", "a", DonationStatus::Pending, 20),
            donation("mid", "a", DonationStatus::Assigned, 10),
            donation("done", "a", DonationStatus::Completed, 30),
        ];

        let selected = DonationQuery::all()
            .status_in(&DonationStatus::CLAIMABLE)
            .limit(2)
            .select(rows);

        let ids: Vec<_> = selected.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_query_filters_donor() {
        let rows = vec![
            donation("mine", "me", DonationStatus::Pending, 0),
            donation("theirs", "them", DonationStatus::Pending, 1),
        ];

        let selected = DonationQuery::all().donor("me").select(rows);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "mine");
    }

    #[test]
    fn test_guard_matches_status_and_assignment() {
        let mut row = donation("d", "a", DonationStatus::Pending, 0);
        let guard = DonationGuard::observed(&row);
        assert!(guard.matches(&row));

        row.assigned_volunteer_id = Some("v1".to_string());
        assert!(!guard.matches(&row));
    }
}
