// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::Utc;
use donate_connect::config::Config;
use donate_connect::db::{FirestoreDb, InMemoryStore, RecordStore};
use donate_connect::feed::ChangeFeed;
use donate_connect::middleware::auth::create_jwt;
use donate_connect::models::{NewDonation, Profile, Role, UserRole};
use donate_connect::routes::create_router;
use donate_connect::services::notify::{Notifier, NotifyError, OutgoingMessage};
use donate_connect::services::{LocalObjectStorage, UserContext};
use donate_connect::AppState;
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db(feed: ChangeFeed) -> FirestoreDb {
    FirestoreDb::new("test-project", feed)
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Offline app wired over an in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: InMemoryStore,
    pub feed: ChangeFeed,
}

#[allow(dead_code)]
impl TestApp {
    /// Session token for `user_id`, signed with the test key.
    pub fn token(&self, user_id: &str) -> String {
        create_jwt(user_id, &self.state.config.jwt_signing_key).expect("sign test jwt")
    }

    pub fn bearer(&self, user_id: &str) -> String {
        format!("Bearer {}", self.token(user_id))
    }
}

/// Create a test app with offline dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let mut config = Config::test_default();
    config.image_storage_dir =
        std::env::temp_dir().join(format!("dc-test-images-{}", uuid::Uuid::new_v4()));
    let feed = ChangeFeed::new();
    let store = InMemoryStore::new(feed.clone());
    let storage = Arc::new(LocalObjectStorage::new(
        config.image_storage_dir.clone(),
        config.image_public_base_url.clone(),
    ));

    let state = Arc::new(AppState::new(
        config,
        Arc::new(store.clone()),
        feed.clone(),
        storage,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        feed,
    }
}

/// Store a profile and its role mapping. Returns the resolved context.
#[allow(dead_code)]
pub async fn seed_user(
    store: &dyn RecordStore,
    id: &str,
    full_name: &str,
    phone: Option<&str>,
    roles: &[Role],
) -> UserContext {
    let now = Utc::now();
    store
        .upsert_profile(&Profile {
            id: id.to_string(),
            full_name: full_name.to_string(),
            phone: phone.map(str::to_string),
            address: None,
            location: None,
            role: roles.first().copied().unwrap_or_default(),
            verified: true,
            created_at: now,
        })
        .await
        .expect("seed profile");

    for (i, role) in roles.iter().enumerate() {
        store
            .insert_user_role(&UserRole {
                id: format!("{}-role-{}", id, i),
                user_id: id.to_string(),
                role: *role,
                created_at: now + chrono::Duration::milliseconds(i as i64),
            })
            .await
            .expect("seed role");
    }

    UserContext::new(id, roles.to_vec())
}

/// A valid pickup request.
#[allow(dead_code)]
pub fn donation_request(category: &str, quantity: u32) -> NewDonation {
    serde_json::from_value(donation_json(category, quantity)).expect("valid request")
}

#[allow(dead_code)]
pub fn donation_json(category: &str, quantity: u32) -> serde_json::Value {
    serde_json::json!({
        "item_category": category,
        "item_description": "Assorted",
        "item_quantity": quantity,
        "pickup_address": "12 Harbor Way",
        "preferred_date": "2024-06-15",
        "preferred_time_slot": "Morning (9 AM - 12 PM)",
        "notes": null,
        "location": { "lat": 37.77, "lng": -122.42 }
    })
}

/// Notifier that records what it was asked to send.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    pub fail: bool,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        self.sent.lock().expect("lock").push(message.clone());
        if self.fail {
            Err(NotifyError::Transport("gateway down".to_string()))
        } else {
            Ok(())
        }
    }
}
