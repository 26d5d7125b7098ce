// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard loading and live dashboard sessions.
//!
//! A session subscribes to the change feed before it loads, so nothing
//! committed between the load and the first event is lost. Each event is
//! folded into the session's private state with the pure projection, the
//! view is re-rendered, and only then is a toast emitted.

use crate::db::{DonationQuery, RecordStore};
use crate::error::Result;
use crate::feed::{ChangeFeed, Delivery, EventType, Subscription, Table};
use crate::services::projection::{DashboardKind, DashboardState, DashboardView, Toast};
use crate::services::session::UserContext;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tables a `kind` dashboard is rendered from. Only the admin view reads
/// the user directory.
fn watched_tables(kind: DashboardKind) -> &'static [Table] {
    match kind {
        DashboardKind::Admin => &[
            Table::Donations,
            Table::PickupEvents,
            Table::Profiles,
            Table::UserRoles,
        ],
        DashboardKind::Donor | DashboardKind::Volunteer => {
            &[Table::Donations, Table::PickupEvents]
        }
    }
}

/// Loads dashboard state from the record store.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn RecordStore>,
    feed: ChangeFeed,
    page_size: usize,
}

impl DashboardService {
    pub fn new(store: Arc<dyn RecordStore>, feed: ChangeFeed, page_size: usize) -> Self {
        Self {
            store,
            feed,
            page_size,
        }
    }

    /// Fail unless `viewer` may open a `kind` dashboard.
    pub fn authorize(&self, kind: DashboardKind, viewer: &UserContext) -> Result<()> {
        match kind {
            DashboardKind::Donor => viewer.require_role(crate::models::Role::Donor),
            DashboardKind::Volunteer => viewer.require_role(crate::models::Role::Volunteer),
            DashboardKind::Admin => viewer.require_admin(),
        }
    }

    /// Fetch every row a `kind` dashboard is built from.
    pub async fn snapshot(&self, kind: DashboardKind) -> Result<DashboardState> {
        let donations = self.store.list_donations(&DonationQuery::all()).await?;
        let pickup_events = self.store.list_pickup_events().await?;
        let mut state = DashboardState::new(donations, pickup_events);

        if kind == DashboardKind::Admin {
            let profiles = self.store.list_profiles().await?;
            let roles = self.store.list_user_roles().await?;
            state = state.with_directory(profiles, roles);
        }
        Ok(state)
    }

    /// One-shot render.
    pub async fn load(&self, kind: DashboardKind, viewer: &UserContext) -> Result<DashboardView> {
        self.authorize(kind, viewer)?;
        let state = self.snapshot(kind).await?;
        Ok(state.view(kind, viewer, self.page_size))
    }

    /// Open a live session. Returns the session and its initial view.
    pub async fn open(
        &self,
        kind: DashboardKind,
        viewer: UserContext,
    ) -> Result<(DashboardSession, DashboardView)> {
        self.authorize(kind, &viewer)?;

        let subscription = self.feed.subscribe(watched_tables(kind), &EventType::ALL);
        let state = self.snapshot(kind).await?;
        let view = state.view(kind, &viewer, self.page_size);

        tracing::debug!(user_id = %viewer.user_id, dashboard = ?kind, "Dashboard session opened");

        let session = DashboardSession {
            service: self.clone(),
            kind,
            viewer,
            state,
            last_view: view.clone(),
            subscription,
        };
        Ok((session, view))
    }
}

/// What a live session pushes to its client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionUpdate {
    View(DashboardView),
    Toast(Toast),
}

/// One connected viewer's dashboard.
pub struct DashboardSession {
    service: DashboardService,
    kind: DashboardKind,
    viewer: UserContext,
    state: DashboardState,
    last_view: DashboardView,
    subscription: Subscription,
}

impl DashboardSession {
    pub fn kind(&self) -> DashboardKind {
        self.kind
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Token that ends the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.subscription.cancellation_token()
    }

    /// Release the feed subscription.
    pub fn close(self) {
        tracing::debug!(user_id = %self.viewer.user_id, "Dashboard session closed");
        self.subscription.unsubscribe();
    }

    /// Wait for the next change and return what the client should see, in
    /// order. Returns `None` once the session has ended.
    pub async fn next_updates(&mut self) -> Option<Result<Vec<SessionUpdate>>> {
        loop {
            match self.subscription.next().await? {
                Delivery::Missed(missed) => {
                    tracing::info!(missed, user_id = %self.viewer.user_id, "Reloading lagged dashboard");
                    match self.service.snapshot(self.kind).await {
                        Ok(state) => self.state = state,
                        Err(e) => return Some(Err(e)),
                    }
                    let view = self.render();
                    self.last_view = view.clone();
                    return Some(Ok(vec![SessionUpdate::View(view)]));
                }
                Delivery::Event(event) => {
                    // Check both sides: a pickup event may arrive before
                    // the donation row it belongs to.
                    let state = std::mem::take(&mut self.state);
                    let relevant_before = state.is_relevant(self.kind, &self.viewer, &event);
                    self.state = state.apply(&event);
                    let relevant = relevant_before
                        || self.state.is_relevant(self.kind, &self.viewer, &event);

                    let view = self.render();
                    let toast = relevant.then(|| Toast::for_event(&event)).flatten();
                    if view == self.last_view && toast.is_none() {
                        continue;
                    }

                    self.last_view = view.clone();
                    let mut updates = vec![SessionUpdate::View(view)];
                    updates.extend(toast.map(SessionUpdate::Toast));
                    return Some(Ok(updates));
                }
            }
        }
    }

    fn render(&self) -> DashboardView {
        self.state
            .view(self.kind, &self.viewer, self.service.page_size)
    }
}
