// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local record store.
//!
//! Rows live in `DashMap`s. A conditional donation write holds the row's
//! shard lock for the whole check-and-replace, so concurrent claims on one
//! donation serialize and exactly one guard can match. Change events are
//! published while the lock is held, which keeps per-row feed order equal
//! to commit order.

use crate::db::{ConditionalWrite, DonationGuard, DonationQuery, RecordStore};
use crate::error::AppError;
use crate::feed::{ChangeEvent, ChangeFeed, Record};
use crate::models::{Donation, PickupEvent, Profile, UserRole};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct InMemoryStore {
    donations: Arc<DashMap<String, Donation>>,
    profiles: Arc<DashMap<String, Profile>>,
    user_roles: Arc<DashMap<String, UserRole>>,
    pickup_events: Arc<DashMap<String, PickupEvent>>,
    feed: ChangeFeed,
}

impl InMemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            donations: Arc::new(DashMap::new()),
            profiles: Arc::new(DashMap::new()),
            user_roles: Arc::new(DashMap::new()),
            pickup_events: Arc::new(DashMap::new()),
            feed,
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_donation(&self, id: &str) -> Result<Option<Donation>, AppError> {
        Ok(self.donations.get(id).map(|row| row.value().clone()))
    }

    async fn list_donations(&self, query: &DonationQuery) -> Result<Vec<Donation>, AppError> {
        let rows: Vec<Donation> = self
            .donations
            .iter()
            .map(|row| row.value().clone())
            .collect();
        Ok(query.select(rows))
    }

    async fn insert_donation(&self, donation: &Donation) -> Result<(), AppError> {
        match self.donations.entry(donation.id.clone()) {
            Entry::Occupied(_) => Err(AppError::BadRequest(format!(
                "Donation {} already exists",
                donation.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(donation.clone());
                self.feed
                    .publish(ChangeEvent::insert(Record::Donation(donation.clone())));
                Ok(())
            }
        }
    }

    async fn update_donation_if(
        &self,
        guard: &DonationGuard,
        updated: &Donation,
        pickup_event: Option<&PickupEvent>,
    ) -> Result<ConditionalWrite, AppError> {
        let Some(mut row) = self.donations.get_mut(&updated.id) else {
            return Ok(ConditionalWrite::Rejected(None));
        };

        if !guard.matches(row.value()) {
            return Ok(ConditionalWrite::Rejected(Some(row.value().clone())));
        }

        let previous = std::mem::replace(row.value_mut(), updated.clone());
        self.feed.publish(ChangeEvent::update(
            Record::Donation(previous),
            Record::Donation(updated.clone()),
        ));

        if let Some(event) = pickup_event {
            self.pickup_events.insert(event.id.clone(), event.clone());
            self.feed
                .publish(ChangeEvent::insert(Record::PickupEvent(event.clone())));
        }

        Ok(ConditionalWrite::Applied)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.get(id).map(|row| row.value().clone()))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let mut profiles: Vec<Profile> = self
            .profiles
            .iter()
            .map(|row| row.value().clone())
            .collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(profiles)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let event = match self.profiles.insert(profile.id.clone(), profile.clone()) {
            Some(old) => {
                ChangeEvent::update(Record::Profile(old), Record::Profile(profile.clone()))
            }
            None => ChangeEvent::insert(Record::Profile(profile.clone())),
        };
        self.feed.publish(event);
        Ok(())
    }

    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<UserRole>, AppError> {
        let mut roles: Vec<UserRole> = self
            .user_roles
            .iter()
            .filter(|row| row.value().user_id == user_id)
            .map(|row| row.value().clone())
            .collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn list_user_roles(&self) -> Result<Vec<UserRole>, AppError> {
        let mut roles: Vec<UserRole> = self
            .user_roles
            .iter()
            .map(|row| row.value().clone())
            .collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn insert_user_role(&self, role: &UserRole) -> Result<(), AppError> {
        self.user_roles.insert(role.id.clone(), role.clone());
        self.feed
            .publish(ChangeEvent::insert(Record::UserRole(role.clone())));
        Ok(())
    }

    async fn pickup_events_for(&self, donation_id: &str) -> Result<Vec<PickupEvent>, AppError> {
        let mut events: Vec<PickupEvent> = self
            .pickup_events
            .iter()
            .filter(|row| row.value().donation_id == donation_id)
            .map(|row| row.value().clone())
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    async fn list_pickup_events(&self) -> Result<Vec<PickupEvent>, AppError> {
        Ok(self
            .pickup_events
            .iter()
            .map(|row| row.value().clone())
            .collect())
    }
}
