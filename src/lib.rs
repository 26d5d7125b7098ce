// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! DonateConnect: donation pickup coordination.
//!
//! This crate provides the backend for donors, volunteers and admins: the
//! donation lifecycle, the volunteer claim protocol, role dashboards kept
//! live from a change feed, and SMS notifications on status changes.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::RecordStore;
use feed::ChangeFeed;
use services::{AssignmentCoordinator, DashboardService, LifecycleEngine, ObjectStorage};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub feed: ChangeFeed,
    pub lifecycle: LifecycleEngine,
    pub assignments: AssignmentCoordinator,
    pub dashboards: DashboardService,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    /// Wire the services over one store and its feed.
    pub fn new(
        config: Config,
        store: Arc<dyn RecordStore>,
        feed: ChangeFeed,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let lifecycle = LifecycleEngine::new(store.clone());
        let assignments = AssignmentCoordinator::new(lifecycle.clone());
        let dashboards =
            DashboardService::new(store.clone(), feed.clone(), config.available_page_size);
        Self {
            config,
            store,
            feed,
            lifecycle,
            assignments,
            dashboards,
            storage,
        }
    }
}
