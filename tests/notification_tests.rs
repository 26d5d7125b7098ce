// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification dispatcher tests over the live change feed.

use donate_connect::db::RecordStore;
use donate_connect::models::{DonationStatus, Role};
use donate_connect::services::notify::OutgoingMessage;
use donate_connect::services::{Actor, CompletionProof, NotificationDispatcher, Transition};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{create_test_app, donation_request, seed_user, RecordingNotifier};

/// Wait until `notifier` has recorded at least `count` messages.
async fn wait_for_messages(notifier: &RecordingNotifier, count: usize) -> Vec<OutgoingMessage> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let sent = notifier.messages();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for notifications")
}

#[tokio::test]
async fn test_claim_notifies_donor_and_volunteer() {
    let app = create_test_app();
    let notifier = RecordingNotifier::default();
    let (handle, token) = NotificationDispatcher::new(
        Arc::new(app.store.clone()),
        Arc::new(notifier.clone()),
    )
    .spawn(&app.feed);

    let donor = seed_user(&app.store, "donor", "Dana Smith", Some("555-0100"), &[Role::Donor]).await;
    let volunteer = seed_user(
        &app.store,
        "vol",
        "Val Jones",
        Some("555-0199"),
        &[Role::Volunteer],
    )
    .await;

    let created = app
        .state
        .lifecycle
        .create_donation(&donor, donation_request("Books", 2))
        .await
        .unwrap();
    app.state.assignments.claim(&created.id, &volunteer).await.unwrap();

    let sent = wait_for_messages(&notifier, 2).await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "555-0100");
    assert!(sent[0].message.contains("accepted by Val Jones"));
    assert_eq!(sent[1].to, "555-0199");
    assert!(sent[1].message.contains("Books from Dana Smith"));
    assert!(sent[1].message.contains("6/15/2024"));

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_failing_gateway_keeps_transition() {
    let app = create_test_app();
    let notifier = RecordingNotifier::failing();
    let (handle, token) = NotificationDispatcher::new(
        Arc::new(app.store.clone()),
        Arc::new(notifier.clone()),
    )
    .spawn(&app.feed);

    let donor = seed_user(&app.store, "donor", "Dana", Some("555-0100"), &[Role::Donor]).await;
    let volunteer = seed_user(&app.store, "vol", "Val", Some("555-0199"), &[Role::Volunteer]).await;
    let v = Actor::User(volunteer.clone());

    let created = app
        .state
        .lifecycle
        .create_donation(&donor, donation_request("Toys", 1))
        .await
        .unwrap();
    app.state.assignments.claim(&created.id, &volunteer).await.unwrap();
    app.state
        .lifecycle
        .apply(&created.id, &v, Transition::Start)
        .await
        .unwrap();

    // Claim sends two, start sends one to the donor.
    wait_for_messages(&notifier, 3).await;

    let stored = app.store.get_donation(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::InProgress);
    assert_eq!(stored.assigned_volunteer_id.as_deref(), Some("vol"));

    // The dispatcher keeps running after failures.
    app.state
        .lifecycle
        .apply(
            &created.id,
            &v,
            Transition::Complete(CompletionProof {
                proof_images: vec!["https://img/p.jpg".to_string()],
                signature_data: None,
                notes: None,
            }),
        )
        .await
        .unwrap();
    let sent = wait_for_messages(&notifier, 4).await;
    assert!(sent[3].message.contains("successfully picked up"));

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_recipient_without_phone_is_skipped() {
    let app = create_test_app();
    let notifier = RecordingNotifier::default();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(app.store.clone()),
        Arc::new(notifier.clone()),
    );
    let mut subscription = app.feed.subscribe(
        &[donate_connect::feed::Table::Donations],
        &[donate_connect::feed::EventType::Update],
    );

    let donor = seed_user(&app.store, "donor", "Dana", None, &[Role::Donor]).await;
    let volunteer = seed_user(&app.store, "vol", "Val", Some("555-0199"), &[Role::Volunteer]).await;

    let created = app
        .state
        .lifecycle
        .create_donation(&donor, donation_request("Books", 1))
        .await
        .unwrap();
    app.state.assignments.claim(&created.id, &volunteer).await.unwrap();

    let Some(donate_connect::feed::Delivery::Event(event)) = subscription.next().await else {
        panic!("expected the claim update");
    };
    assert_eq!(dispatcher.handle(&event).await, 1);
    assert_eq!(notifier.messages()[0].to, "555-0199");
}
