// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role dashboards and the live dashboard stream.

use crate::error::{AppError, Result};
use crate::models::Role;
use crate::services::dashboard::SessionUpdate;
use crate::services::projection::{DashboardKind, DashboardView};
use crate::services::session::UserContext;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard/stream", get(dashboard_stream))
        .route("/api/dashboard/{kind}", get(get_dashboard))
}

fn parse_kind(raw: &str) -> Result<DashboardKind> {
    raw.parse().map_err(AppError::BadRequest)
}

/// Dashboard matching the user's primary role.
fn default_kind(ctx: &UserContext) -> DashboardKind {
    match ctx.primary_role() {
        Role::Donor => DashboardKind::Donor,
        Role::Volunteer => DashboardKind::Volunteer,
        Role::Admin | Role::Ngo => DashboardKind::Admin,
    }
}

async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(kind): Path<String>,
) -> Result<Json<DashboardView>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.dashboards.load(kind, &ctx).await?))
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub kind: Option<String>,
}

fn sse_event(update: &SessionUpdate) -> Event {
    let (name, result) = match update {
        SessionUpdate::View(view) => ("view", Event::default().event("view").json_data(view)),
        SessionUpdate::Toast(toast) => ("toast", Event::default().event("toast").json_data(toast)),
    };
    result.unwrap_or_else(|e| {
        tracing::error!(event = name, error = %e, "Failed to encode dashboard event");
        Event::default().event("error").data("encoding failed")
    })
}

/// Live dashboard over server-sent events.
///
/// Sends the initial `view`, then for every relevant change a fresh `view`
/// followed by at most one `toast`. The feed subscription is released when
/// the client disconnects and the stream is dropped.
async fn dashboard_stream(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let kind = match params.kind.as_deref() {
        Some(raw) => parse_kind(raw)?,
        None => default_kind(&ctx),
    };

    let (session, initial) = state.dashboards.open(kind, ctx).await?;
    let first = stream::once(async move {
        Ok::<_, Infallible>(sse_event(&SessionUpdate::View(initial)))
    });

    let rest = stream::unfold(session, |mut session| async move {
        let events: Vec<std::result::Result<Event, Infallible>> =
            match session.next_updates().await? {
                Ok(updates) => updates.iter().map(|u| Ok(sse_event(u))).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Dashboard refresh failed");
                    let retryable = e.is_retryable();
                    vec![Ok(Event::default()
                        .event("error")
                        .data(if retryable { "retry" } else { "failed" }))]
                }
            };
        Some((stream::iter(events), session))
    })
    .flatten();

    Ok(Sse::new(first.chain(rest)).keep_alive(KeepAlive::default()))
}
