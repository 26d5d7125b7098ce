// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard projection.
//!
//! A [`DashboardState`] is a disposable copy of the rows a dashboard needs.
//! It is advanced one change event at a time by [`DashboardState::apply`],
//! a pure function, and every role view is a filter over it. Nothing here
//! is consulted when validating a transition.
//!
//! Donation rows merge last-writer-wins on `updated_at`, with the lifecycle
//! rank breaking ties, so the same events applied in any order converge to
//! the same state.

use crate::feed::{ChangeEvent, EventType, Record};
use crate::models::{DashboardStats, Donation, DonationStatus, PickupEvent, Profile, Role, UserRole};
use crate::services::session::UserContext;
use serde::Serialize;
use std::collections::HashMap;

/// Rows backing one dashboard session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    donations: HashMap<String, Donation>,
    pickup_events: HashMap<String, PickupEvent>,
    profiles: HashMap<String, Profile>,
    user_roles: HashMap<String, UserRole>,
}

/// Whether `candidate` should replace `current`.
fn supersedes(candidate: &Donation, current: &Donation) -> bool {
    (candidate.updated_at, candidate.status.progress_rank())
        > (current.updated_at, current.status.progress_rank())
}

impl DashboardState {
    pub fn new(
        donations: impl IntoIterator<Item = Donation>,
        pickup_events: impl IntoIterator<Item = PickupEvent>,
    ) -> Self {
        Self::default()
            .with_donations(donations)
            .with_pickup_events(pickup_events)
    }

    pub fn with_donations(mut self, donations: impl IntoIterator<Item = Donation>) -> Self {
        for donation in donations {
            self.merge_donation(donation);
        }
        self
    }

    pub fn with_pickup_events(mut self, events: impl IntoIterator<Item = PickupEvent>) -> Self {
        for event in events {
            self.pickup_events.insert(event.id.clone(), event);
        }
        self
    }

    pub fn with_directory(
        mut self,
        profiles: impl IntoIterator<Item = Profile>,
        user_roles: impl IntoIterator<Item = UserRole>,
    ) -> Self {
        for profile in profiles {
            self.profiles.insert(profile.id.clone(), profile);
        }
        for role in user_roles {
            self.user_roles.insert(role.id.clone(), role);
        }
        self
    }

    fn merge_donation(&mut self, donation: Donation) {
        match self.donations.get(&donation.id) {
            Some(current) if !supersedes(&donation, current) => {}
            _ => {
                self.donations.insert(donation.id.clone(), donation);
            }
        }
    }

    /// Advance the state by one change event.
    pub fn apply(mut self, event: &ChangeEvent) -> Self {
        if event.event_type == EventType::Delete {
            match &event.old {
                Some(Record::Donation(d)) => {
                    self.donations.remove(&d.id);
                }
                Some(Record::PickupEvent(e)) => {
                    self.pickup_events.remove(&e.id);
                }
                Some(Record::Profile(p)) => {
                    self.profiles.remove(&p.id);
                }
                Some(Record::UserRole(r)) => {
                    self.user_roles.remove(&r.id);
                }
                None => {}
            }
            return self;
        }

        match &event.new {
            Some(Record::Donation(d)) => self.merge_donation(d.clone()),
            Some(Record::PickupEvent(e)) => {
                self.pickup_events.insert(e.id.clone(), e.clone());
            }
            Some(Record::Profile(p)) => {
                self.profiles.insert(p.id.clone(), p.clone());
            }
            Some(Record::UserRole(r)) => {
                self.user_roles.insert(r.id.clone(), r.clone());
            }
            None => {}
        }
        self
    }

    pub fn donation(&self, id: &str) -> Option<&Donation> {
        self.donations.get(id)
    }

    pub fn donation_count(&self) -> usize {
        self.donations.len()
    }

    /// Pickup events recorded for one donation, oldest first.
    pub fn pickup_events_for(&self, donation_id: &str) -> Vec<&PickupEvent> {
        let mut events: Vec<&PickupEvent> = self
            .pickup_events
            .values()
            .filter(|e| e.donation_id == donation_id)
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        events
    }

    fn select(&self, keep: impl Fn(&Donation) -> bool) -> Vec<Donation> {
        let mut rows: Vec<Donation> = self.donations.values().filter(|d| keep(*d)).cloned().collect();
        crate::db::sort_newest_first(&mut rows);
        rows
    }

    /// Counts over every donation in the state.
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_donations(self.donations.values())
    }

    /// Role of `user_id` per the mapping: earliest entry, else donor.
    pub fn resolved_role(&self, user_id: &str) -> Role {
        self.user_roles
            .values()
            .filter(|r| r.user_id == user_id)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .map(|r| r.role)
            .unwrap_or_default()
    }

    pub fn donor_view(&self, donor: &UserContext) -> DonorView {
        let donations = self.select(|d| d.donor_id == donor.user_id);
        let stats = DashboardStats::from_donations(&donations);
        DonorView { donations, stats }
    }

    /// Claimable donations, newest first, at most `page_size` of them.
    pub fn available_view(&self, page_size: usize) -> Vec<Donation> {
        let mut rows = self.select(|d| d.status.is_claimable());
        rows.truncate(page_size);
        rows
    }

    pub fn assigned_view(&self, volunteer: &UserContext) -> Vec<Donation> {
        self.select(|d| d.is_assigned_to(&volunteer.user_id))
    }

    pub fn volunteer_view(&self, volunteer: &UserContext, page_size: usize) -> VolunteerView {
        let assigned = self.assigned_view(volunteer);
        let stats = DashboardStats::from_donations(&assigned);
        VolunteerView {
            available: self.available_view(page_size),
            assigned,
            stats,
        }
    }

    pub fn admin_view(&self) -> AdminView {
        let mut profiles: Vec<ProfileWithRole> = self
            .profiles
            .values()
            .map(|p| ProfileWithRole {
                role: self.resolved_role(&p.id),
                profile: p.clone(),
            })
            .collect();
        profiles.sort_by(|a, b| {
            b.profile
                .created_at
                .cmp(&a.profile.created_at)
                .then_with(|| a.profile.id.cmp(&b.profile.id))
        });

        let stats = self.stats().with_roles(profiles.iter().map(|p| p.role));
        let summary = AdminSummary {
            total_donations: stats.total,
            pending: stats.count(DonationStatus::Pending),
            completed: stats.count(DonationStatus::Completed),
            total_donors: stats.role_count(Role::Donor),
            total_volunteers: stats.role_count(Role::Volunteer),
        };

        AdminView {
            donations: self.select(|_| true),
            profiles,
            stats,
            summary,
        }
    }

    /// Whether `event` touches what `viewer` sees on a `kind` dashboard.
    pub fn is_relevant(&self, kind: DashboardKind, viewer: &UserContext, event: &ChangeEvent) -> bool {
        let donation_visible = |d: &Donation| match kind {
            DashboardKind::Admin => true,
            DashboardKind::Donor => d.donor_id == viewer.user_id,
            DashboardKind::Volunteer => {
                d.status.is_claimable() || d.is_assigned_to(&viewer.user_id)
            }
        };

        match (&event.new, &event.old) {
            (Some(Record::Donation(_)), _) | (_, Some(Record::Donation(_))) => event
                .new_donation()
                .into_iter()
                .chain(event.old_donation())
                .any(donation_visible),
            (Some(Record::PickupEvent(e)), _) => match kind {
                DashboardKind::Admin => true,
                DashboardKind::Volunteer if e.volunteer_id == viewer.user_id => true,
                _ => self.donation(&e.donation_id).is_some_and(donation_visible),
            },
            (Some(Record::Profile(_)), _) | (Some(Record::UserRole(_)), _) => {
                kind == DashboardKind::Admin
            }
            _ => false,
        }
    }
}

/// The three role dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    Donor,
    Volunteer,
    Admin,
}

impl std::str::FromStr for DashboardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donor" => Ok(DashboardKind::Donor),
            "volunteer" => Ok(DashboardKind::Volunteer),
            "admin" => Ok(DashboardKind::Admin),
            other => Err(format!("unknown dashboard '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorView {
    pub donations: Vec<Donation>,
    pub stats: DashboardStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolunteerView {
    pub available: Vec<Donation>,
    pub assigned: Vec<Donation>,
    pub stats: DashboardStats,
}

/// A profile with its role resolved through the mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileWithRole {
    pub profile: Profile,
    /// From the mapping; `profile.role` is not consulted
    pub role: Role,
}

/// Headline numbers on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminSummary {
    pub total_donations: u32,
    pub pending: u32,
    pub completed: u32,
    pub total_donors: u32,
    pub total_volunteers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminView {
    pub donations: Vec<Donation>,
    pub profiles: Vec<ProfileWithRole>,
    pub stats: DashboardStats,
    pub summary: AdminSummary,
}

/// One rendered dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dashboard", rename_all = "snake_case")]
pub enum DashboardView {
    Donor(DonorView),
    Volunteer(VolunteerView),
    Admin(AdminView),
}

impl DashboardState {
    /// Render the `kind` dashboard for `viewer`.
    pub fn view(&self, kind: DashboardKind, viewer: &UserContext, page_size: usize) -> DashboardView {
        match kind {
            DashboardKind::Donor => DashboardView::Donor(self.donor_view(viewer)),
            DashboardKind::Volunteer => {
                DashboardView::Volunteer(self.volunteer_view(viewer, page_size))
            }
            DashboardKind::Admin => DashboardView::Admin(self.admin_view()),
        }
    }
}

/// User-visible notice for a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
}

impl Toast {
    /// Notice text for a change event, if it warrants one.
    pub fn for_event(event: &ChangeEvent) -> Option<Self> {
        match (&event.new, event.event_type) {
            (Some(Record::Donation(_)), EventType::Insert) => Some(Toast {
                title: "New Donation".to_string(),
                description: "A new donation has been scheduled".to_string(),
            }),
            (Some(Record::Donation(d)), EventType::Update) => Some(Toast {
                title: "Status Updated".to_string(),
                description: format!("Donation status changed to {}", d.status),
            }),
            (Some(Record::PickupEvent(_)), EventType::Insert) => Some(Toast {
                title: "Pickup Update".to_string(),
                description: "New pickup event recorded".to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn donation(id: &str, donor: &str, status: DonationStatus, minute: i64) -> Donation {
        let created = base() + Duration::minutes(minute);
        Donation {
            id: id.to_string(),
            donor_id: donor.to_string(),
            item_category: "Clothing".to_string(),
            item_description: None,
            item_quantity: 2,
            pickup_address: "4 Elm St".to_string(),
            preferred_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            preferred_time_slot: TimeSlot::Afternoon,
            notes: None,
            location: None,
            images: vec![],
            status,
            assigned_volunteer_id: status.requires_volunteer().then(|| "v1".to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    fn profile(id: &str, minute: i64) -> Profile {
        Profile {
            id: id.to_string(),
            full_name: format!("{} Person", id),
            phone: None,
            address: None,
            location: None,
            role: Role::Admin,
            verified: false,
            created_at: base() + Duration::minutes(minute),
        }
    }

    fn role(id: &str, user: &str, role: Role, minute: i64) -> UserRole {
        UserRole {
            id: id.to_string(),
            user_id: user.to_string(),
            role,
            created_at: base() + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_later_update_wins_regardless_of_arrival() {
        let pending = donation("d1", "a", DonationStatus::Pending, 0);
        let mut accepted = pending.clone();
        accepted.status = DonationStatus::Accepted;
        accepted.assigned_volunteer_id = Some("v1".to_string());
        accepted.updated_at = base() + Duration::minutes(5);

        let insert = ChangeEvent::insert(Record::Donation(pending.clone()));
        let update = ChangeEvent::update(
            Record::Donation(pending.clone()),
            Record::Donation(accepted.clone()),
        );

        let forward = DashboardState::default().apply(&insert).apply(&update);
        let reverse = DashboardState::default().apply(&update).apply(&insert);

        assert_eq!(forward, reverse);
        assert_eq!(forward.donation("d1"), Some(&accepted));
    }

    #[test]
    fn test_equal_timestamps_prefer_later_status() {
        let accepted = donation("d1", "a", DonationStatus::Accepted, 0);
        let mut cancelled = accepted.clone();
        cancelled.status = DonationStatus::Cancelled;
        cancelled.assigned_volunteer_id = None;

        let state = DashboardState::default()
            .apply(&ChangeEvent::insert(Record::Donation(cancelled.clone())))
            .apply(&ChangeEvent::insert(Record::Donation(accepted)));
        assert_eq!(state.donation("d1"), Some(&cancelled));
    }

    #[test]
    fn test_available_view_is_recent_claimable_window() {
        let state = DashboardState::new(
            (0..15)
                .map(|i| donation(&format!("p{:02}", i), "a", DonationStatus::Pending, i))
                .chain([donation("done", "a", DonationStatus::Completed, 99)]),
            [],
        );

        let available = state.available_view(10);
        assert_eq!(available.len(), 10);
        assert_eq!(available[0].id, "p14");
        assert!(available.iter().all(|d| d.status.is_claimable()));
    }

    #[test]
    fn test_donor_and_assigned_views_filter_by_identity() {
        let state = DashboardState::new(
            [
                donation("mine", "me", DonationStatus::Pending, 0),
                donation("theirs", "them", DonationStatus::Accepted, 1),
            ],
            [],
        );

        let me = UserContext::new("me", vec![]);
        let view = state.donor_view(&me);
        assert_eq!(view.donations.len(), 1);
        assert_eq!(view.stats.count(DonationStatus::Pending), 1);

        let v1 = UserContext::new("v1", vec![Role::Volunteer]);
        let assigned = state.assigned_view(&v1);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, "theirs");
    }

    #[test]
    fn test_admin_view_joins_roles_with_donor_default() {
        let state = DashboardState::default()
            .with_donations([
                donation("a", "p1", DonationStatus::Pending, 0),
                donation("b", "p1", DonationStatus::Completed, 1),
            ])
            .with_directory(
                [profile("p1", 0), profile("p2", 1), profile("p3", 2)],
                [
                    role("r1", "p2", Role::Volunteer, 0),
                    role("r2", "p2", Role::Admin, 1),
                    role("r3", "p3", Role::Ngo, 0),
                ],
            );

        let view = state.admin_view();
        let roles: Vec<(String, Role)> = view
            .profiles
            .iter()
            .map(|p| (p.profile.id.clone(), p.role))
            .collect();
        assert_eq!(
            roles,
            vec![
                ("p3".to_string(), Role::Ngo),
                ("p2".to_string(), Role::Volunteer),
                ("p1".to_string(), Role::Donor),
            ]
        );
        assert_eq!(
            view.summary,
            AdminSummary {
                total_donations: 2,
                pending: 1,
                completed: 1,
                total_donors: 1,
                total_volunteers: 1,
            }
        );
    }

    #[test]
    fn test_toast_text() {
        let d = donation("d1", "a", DonationStatus::Pending, 0);
        let mut started = d.clone();
        started.status = DonationStatus::InProgress;

        assert_eq!(
            Toast::for_event(&ChangeEvent::insert(Record::Donation(d.clone())))
                .unwrap()
                .title,
            "New Donation"
        );
        assert_eq!(
            Toast::for_event(&ChangeEvent::update(
                Record::Donation(d),
                Record::Donation(started)
            ))
            .unwrap()
            .description,
            "Donation status changed to in_progress"
        );
    }

    #[test]
    fn test_relevance_by_dashboard() {
        let state = DashboardState::default();
        let theirs = donation("d1", "them", DonationStatus::Accepted, 0);
        let event = ChangeEvent::insert(Record::Donation(theirs));

        let me = UserContext::new("me", vec![]);
        assert!(!state.is_relevant(DashboardKind::Donor, &me, &event));
        assert!(state.is_relevant(DashboardKind::Admin, &me, &event));

        let v1 = UserContext::new("v1", vec![Role::Volunteer]);
        assert!(state.is_relevant(DashboardKind::Volunteer, &v1, &event));
        let v2 = UserContext::new("v2", vec![Role::Volunteer]);
        assert!(!state.is_relevant(DashboardKind::Volunteer, &v2, &event));
    }
}
