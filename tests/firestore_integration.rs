// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! `FIRESTORE_EMULATOR_HOST` to point at it. Without it they are skipped.
//!
//! Every test uses fresh random IDs so runs do not interfere.

use chrono::Utc;
use donate_connect::db::{ConditionalWrite, DonationGuard, DonationQuery, FirestoreDb, RecordStore};
use donate_connect::error::AppError;
use donate_connect::feed::{ChangeFeed, Delivery, EventType, Table};
use donate_connect::models::{Donation, DonationStatus, PickupEvent, Role, UserRole};

mod common;
use common::{donation_request, seed_user, test_db};

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

fn new_donation(donor_id: &str) -> Donation {
    Donation::new(
        unique("don"),
        donor_id.to_string(),
        donation_request("Books", 2),
        Utc::now(),
    )
}

fn accepted_by(current: &Donation, volunteer_id: &str) -> Donation {
    let mut next = current.clone();
    next.status = DonationStatus::Accepted;
    next.assigned_volunteer_id = Some(volunteer_id.to_string());
    next.updated_at = Utc::now();
    next
}

// ═══════════════════════════════════════════════════════════════════════════
// DONATION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_donation_insert_and_get() {
    require_emulator!();

    let db = test_db(ChangeFeed::new()).await;
    let donation = new_donation(&unique("donor"));

    assert!(db.get_donation(&donation.id).await.unwrap().is_none());
    db.insert_donation(&donation).await.unwrap();

    let fetched = db.get_donation(&donation.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, donation.id);
    assert_eq!(fetched.status, DonationStatus::Pending);
    assert_eq!(fetched.item_quantity, 2);
    assert_eq!(fetched.preferred_date, donation.preferred_date);
}

#[tokio::test]
async fn test_donation_list_filters_by_donor() {
    require_emulator!();

    let db = test_db(ChangeFeed::new()).await;
    let donor = unique("donor");
    let other = unique("donor");

    for _ in 0..3 {
        db.insert_donation(&new_donation(&donor)).await.unwrap();
    }
    db.insert_donation(&new_donation(&other)).await.unwrap();

    let mine = db
        .list_donations(&DonationQuery::all().donor(&donor))
        .await
        .unwrap();
    assert_eq!(mine.len(), 3);
    assert!(mine.iter().all(|d| d.donor_id == donor));
    assert!(mine.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_conditional_update_rejects_stale_guard() {
    require_emulator!();

    let db = test_db(ChangeFeed::new()).await;
    let donation = new_donation(&unique("donor"));
    db.insert_donation(&donation).await.unwrap();

    let guard = DonationGuard::observed(&donation);
    let first = db
        .update_donation_if(&guard, &accepted_by(&donation, "v1"), None)
        .await
        .unwrap();
    assert_eq!(first, ConditionalWrite::Applied);

    let second = db
        .update_donation_if(&guard, &accepted_by(&donation, "v2"), None)
        .await
        .unwrap();
    match second {
        ConditionalWrite::Rejected(Some(now)) => {
            assert_eq!(now.assigned_volunteer_id.as_deref(), Some("v1"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_completion_writes_pickup_event_atomically() {
    require_emulator!();

    let feed = ChangeFeed::new();
    let mut subscription = feed.subscribe(
        &[Table::Donations, Table::PickupEvents],
        &[EventType::Insert, EventType::Update],
    );
    let db = test_db(feed).await;

    let mut donation = new_donation(&unique("donor"));
    donation.status = DonationStatus::InProgress;
    donation.assigned_volunteer_id = Some("v1".to_string());
    db.insert_donation(&donation).await.unwrap();

    let mut completed = donation.clone();
    completed.status = DonationStatus::Completed;
    completed.updated_at = Utc::now();
    let event = PickupEvent {
        id: unique("pe"),
        donation_id: donation.id.clone(),
        volunteer_id: "v1".to_string(),
        status: "completed".to_string(),
        proof_image: Some("https://img/p.jpg".to_string()),
        signature_data: None,
        notes: Some("Pickup completed successfully".to_string()),
        created_at: completed.updated_at,
    };

    let result = db
        .update_donation_if(&DonationGuard::observed(&donation), &completed, Some(&event))
        .await
        .unwrap();
    assert_eq!(result, ConditionalWrite::Applied);

    let events = db.pickup_events_for(&donation.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, event.id);
    assert_eq!(events[0].volunteer_id, "v1");

    // Insert, then the donation update, then the audit record.
    let mut tables = Vec::new();
    for _ in 0..3 {
        match subscription.next().await {
            Some(Delivery::Event(e)) => tables.push((e.table, e.event_type)),
            other => panic!("unexpected delivery {:?}", other),
        }
    }
    assert_eq!(
        tables,
        vec![
            (Table::Donations, EventType::Insert),
            (Table::Donations, EventType::Update),
            (Table::PickupEvents, EventType::Insert),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE AND ROLE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_roles_resolve_through_mapping() {
    require_emulator!();

    let db = test_db(ChangeFeed::new()).await;
    let user = unique("user");
    seed_user(&db, &user, "Robin Lee", Some("555-0142"), &[Role::Volunteer]).await;

    let profile = db.get_profile(&user).await.unwrap().unwrap();
    assert_eq!(profile.full_name, "Robin Lee");

    db.insert_user_role(&UserRole {
        id: unique("role"),
        user_id: user.clone(),
        role: Role::Admin,
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let roles = db.roles_for_user(&user).await.unwrap();
    let mut names: Vec<Role> = roles.iter().map(|r| r.role).collect();
    names.sort();
    assert_eq!(names, vec![Role::Volunteer, Role::Admin]);
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE CLIENT
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_client_reports_store_unavailable() {
    let db = FirestoreDb::new_mock(ChangeFeed::new());

    let result = db.get_donation("anything").await;
    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert!(result.unwrap_err().is_retryable());
}
