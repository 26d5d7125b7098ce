// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed record store.
//!
//! Provides the store operations for:
//! - Donations (guarded updates run inside a transaction)
//! - Profiles and the user-role mapping
//! - Pickup events (written in the same transaction as completion)
//!
//! Firestore has no push channel wired in here, so committed writes are
//! published to the in-process [`ChangeFeed`] after the commit returns.

use crate::db::{collections, ConditionalWrite, DonationGuard, DonationQuery, RecordStore};
use crate::error::AppError;
use crate::feed::{ChangeEvent, ChangeFeed, Record};
use crate::models::{Donation, PickupEvent, Profile, UserRole};
use async_trait::async_trait;

fn store_error(e: impl std::fmt::Display) -> AppError {
    AppError::StoreUnavailable(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    feed: ChangeFeed,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, feed: ChangeFeed) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, feed).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| store_error(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            feed,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, feed: ChangeFeed) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| store_error(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            feed,
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations fail with `StoreUnavailable`.
    pub fn new_mock(feed: ChangeFeed) -> Self {
        Self { client: None, feed }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| store_error("Database not connected (offline mode)"))
    }

    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(store_error)
    }

    async fn put<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list_all<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(store_error)
    }
}

#[async_trait]
impl RecordStore for FirestoreDb {
    // ─── Donation Operations ─────────────────────────────────────

    async fn get_donation(&self, id: &str) -> Result<Option<Donation>, AppError> {
        self.get_by_id(collections::DONATIONS, id).await
    }

    /// Equality filters run server-side; the status `in` filter and the
    /// limit are applied after the fetch so the limit counts only matches.
    async fn list_donations(&self, query: &DonationQuery) -> Result<Vec<Donation>, AppError> {
        let donor_id = query.donor_id.clone();
        let volunteer_id = query.assigned_volunteer_id.clone();

        let rows: Vec<Donation> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DONATIONS)
            .filter(move |q| {
                q.for_all([
                    donor_id
                        .clone()
                        .and_then(|id| q.field("donor_id").eq(id)),
                    volunteer_id
                        .clone()
                        .and_then(|id| q.field("assigned_volunteer_id").eq(id)),
                ])
            })
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(store_error)?;

        Ok(query.select(rows))
    }

    async fn insert_donation(&self, donation: &Donation) -> Result<(), AppError> {
        if self.get_donation(&donation.id).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "Donation {} already exists",
                donation.id
            )));
        }
        self.put(collections::DONATIONS, &donation.id, donation)
            .await?;
        self.feed
            .publish(ChangeEvent::insert(Record::Donation(donation.clone())));
        Ok(())
    }

    /// Guarded donation write.
    ///
    /// The current row is read through a client bound to the transaction,
    /// so a concurrent commit touching the same document aborts ours at
    /// commit time instead of being overwritten.
    async fn update_donation_if(
        &self,
        guard: &DonationGuard,
        updated: &Donation,
        pickup_event: Option<&PickupEvent>,
    ) -> Result<ConditionalWrite, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error(format!("Failed to begin transaction: {}", e)))?;

        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let current: Option<Donation> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::DONATIONS)
            .obj()
            .one(&updated.id)
            .await
            .map_err(|e| store_error(format!("Failed to read donation in transaction: {}", e)))?;

        let previous = match current {
            Some(row) if guard.matches(&row) => row,
            other => {
                let _ = transaction.rollback().await;
                return Ok(ConditionalWrite::Rejected(other));
            }
        };

        client
            .fluent()
            .update()
            .in_col(collections::DONATIONS)
            .document_id(&updated.id)
            .object(updated)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error(format!("Failed to add donation to transaction: {}", e)))?;

        if let Some(event) = pickup_event {
            client
                .fluent()
                .update()
                .in_col(collections::PICKUP_EVENTS)
                .document_id(&event.id)
                .object(event)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    store_error(format!("Failed to add pickup event to transaction: {}", e))
                })?;
        }

        if let Err(e) = transaction.commit().await {
            // Contention on the document aborts the transaction. Re-read to
            // tell a lost race from a transient failure or a commit that
            // landed despite the error.
            tracing::warn!(donation_id = %updated.id, error = %e, "Guarded donation commit failed");
            match self.get_donation(&updated.id).await? {
                Some(row) if row == *updated => {}
                Some(row) if guard.matches(&row) => {
                    return Err(store_error(format!("Transaction commit failed: {}", e)));
                }
                other => return Ok(ConditionalWrite::Rejected(other)),
            }
        }

        self.feed.publish(ChangeEvent::update(
            Record::Donation(previous),
            Record::Donation(updated.clone()),
        ));
        if let Some(event) = pickup_event {
            self.feed
                .publish(ChangeEvent::insert(Record::PickupEvent(event.clone())));
        }

        Ok(ConditionalWrite::Applied)
    }

    // ─── Profile & Role Operations ───────────────────────────────

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, AppError> {
        self.get_by_id(collections::PROFILES, id).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let mut profiles: Vec<Profile> = self.list_all(collections::PROFILES).await?;
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(profiles)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let previous = self.get_profile(&profile.id).await?;
        self.put(collections::PROFILES, &profile.id, profile).await?;
        let event = match previous {
            Some(old) => ChangeEvent::update(Record::Profile(old), Record::Profile(profile.clone())),
            None => ChangeEvent::insert(Record::Profile(profile.clone())),
        };
        self.feed.publish(event);
        Ok(())
    }

    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<UserRole>, AppError> {
        let user_id = user_id.to_string();
        let mut roles: Vec<UserRole> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USER_ROLES)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(store_error)?;
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn list_user_roles(&self) -> Result<Vec<UserRole>, AppError> {
        let mut roles: Vec<UserRole> = self.list_all(collections::USER_ROLES).await?;
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn insert_user_role(&self, role: &UserRole) -> Result<(), AppError> {
        self.put(collections::USER_ROLES, &role.id, role).await?;
        self.feed
            .publish(ChangeEvent::insert(Record::UserRole(role.clone())));
        Ok(())
    }

    // ─── Pickup Event Operations ─────────────────────────────────

    async fn pickup_events_for(&self, donation_id: &str) -> Result<Vec<PickupEvent>, AppError> {
        let donation_id = donation_id.to_string();
        let mut events: Vec<PickupEvent> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PICKUP_EVENTS)
            .filter(move |q| q.field("donation_id").eq(donation_id.clone()))
            .obj()
            .query()
            .await
            .map_err(store_error)?;
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    async fn list_pickup_events(&self) -> Result<Vec<PickupEvent>, AppError> {
        self.list_all(collections::PICKUP_EVENTS).await
    }
}
