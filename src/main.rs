// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! DonateConnect API Server
//!
//! Coordinates donation pickups between donors, volunteers and admins, with
//! live dashboards and SMS status notifications.

use donate_connect::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, InMemoryStore, RecordStore},
    feed::ChangeFeed,
    services::{LocalObjectStorage, LogNotifier, NotificationDispatcher, Notifier, SmsGateway},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, backend = ?config.store_backend, "Starting DonateConnect API");

    // One feed shared by the store (publisher) and all readers
    let feed = ChangeFeed::new();

    let store: Arc<dyn RecordStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; data is lost on restart");
            Arc::new(InMemoryStore::new(feed.clone()))
        }
        StoreBackend::Firestore => {
            Arc::new(FirestoreDb::new(&config.gcp_project_id, feed.clone()).await?)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.sms_gateway_url {
        Some(url) => {
            tracing::info!(gateway = %url, "SMS gateway configured");
            Arc::new(SmsGateway::new(url.clone(), config.sms_gateway_token.clone()))
        }
        None => {
            tracing::info!("No SMS gateway configured; notifications will be logged");
            Arc::new(LogNotifier)
        }
    };

    let (dispatcher, dispatcher_token) =
        NotificationDispatcher::new(store.clone(), notifier).spawn(&feed);

    let storage = Arc::new(LocalObjectStorage::new(
        config.image_storage_dir.clone(),
        config.image_public_base_url.clone(),
    ));

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, feed, storage));

    // Build router
    let app = donate_connect::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher_token.cancel();
    dispatcher.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("donate_connect=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
