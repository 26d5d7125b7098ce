// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation and image API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Donation, NewDonation, PickupEvent, Role};
use crate::services::detail::{donation_detail, DonationDetail};
use crate::services::lifecycle::{CompletionProof, Transition, TransitionOutcome};
use crate::services::receipt::{self, ReceiptSummary};
use crate::services::session::{Actor, UserContext};
use crate::services::storage::{self, StoredImage};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/donations", post(create_donation))
        .route("/api/donations/{id}", get(get_donation))
        .route("/api/donations/{id}/broadcast", post(broadcast_donation))
        .route("/api/donations/{id}/claim", post(claim_donation))
        .route("/api/donations/{id}/start", post(start_pickup))
        .route("/api/donations/{id}/complete", post(complete_pickup))
        .route("/api/donations/{id}/cancel", post(cancel_donation))
        .route("/api/donations/{id}/receipt", get(get_receipt))
        .route("/api/images", post(upload_image))
        .route("/api/images/{*path}", delete(delete_image))
}

// ─── Current User ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    pub roles: Vec<Role>,
    pub primary_role: Role,
}

/// Who am I, and which dashboards may I open.
async fn get_me(Extension(ctx): Extension<UserContext>) -> Json<MeResponse> {
    Json(MeResponse {
        primary_role: ctx.primary_role(),
        roles: ctx.roles,
        user_id: ctx.user_id,
    })
}

// ─── Donations ───────────────────────────────────────────────

/// Result of a lifecycle action.
#[derive(Serialize)]
pub struct TransitionResponse {
    pub donation: Donation,
    /// False when the donation was already in the requested state
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_event: Option<PickupEvent>,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            donation: outcome.donation,
            changed: outcome.changed,
            pickup_event: outcome.pickup_event,
        }
    }
}

/// Schedule a new pickup.
async fn create_donation(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Json(body): Json<NewDonation>,
) -> Result<(StatusCode, Json<Donation>)> {
    let donation = state.lifecycle.create_donation(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(donation)))
}

/// Donation detail with donor contact masked per pickup progress.
async fn get_donation(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<DonationDetail>> {
    let donation = state.lifecycle.load(&id).await?;
    let donor = state.store.get_profile(&donation.donor_id).await?;
    let pickup_events = state.store.pickup_events_for(&id).await?;

    Ok(Json(donation_detail(
        &ctx,
        donation,
        donor.as_ref(),
        pickup_events,
    )?))
}

/// Publish a pending donation to volunteers (admin-triggered system edge).
async fn broadcast_donation(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>> {
    ctx.require_admin()?;
    tracing::info!(donation_id = %id, admin_id = %ctx.user_id, "Broadcast requested");

    let outcome = state
        .lifecycle
        .apply(&id, &Actor::System, Transition::Broadcast)
        .await?;
    Ok(Json(outcome.into()))
}

async fn claim_donation(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<Donation>> {
    Ok(Json(state.assignments.claim(&id, &ctx).await?))
}

async fn start_pickup(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>> {
    let outcome = state
        .lifecycle
        .apply(&id, &Actor::User(ctx), Transition::Start)
        .await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub proof_images: Vec<String>,
    pub signature_data: Option<String>,
    pub notes: Option<String>,
}

async fn complete_pickup(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<TransitionResponse>> {
    let proof = CompletionProof {
        proof_images: body.proof_images,
        signature_data: body.signature_data,
        notes: body.notes,
    };
    let outcome = state
        .lifecycle
        .apply(&id, &Actor::User(ctx), Transition::Complete(proof))
        .await?;
    Ok(Json(outcome.into()))
}

async fn cancel_donation(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<TransitionResponse>> {
    let outcome = state
        .lifecycle
        .apply(&id, &Actor::User(ctx), Transition::Cancel)
        .await?;
    Ok(Json(outcome.into()))
}

/// Plain-text receipt for a completed pickup.
async fn get_receipt(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let donation = state.lifecycle.load(&id).await?;
    let party = donation.donor_id == ctx.user_id
        || donation.is_assigned_to(&ctx.user_id)
        || ctx.is_admin();
    if !party {
        return Err(AppError::Unauthorized(
            "not a party to this donation".to_string(),
        ));
    }

    let donor = state.store.get_profile(&donation.donor_id).await?;
    let volunteer = match donation.assigned_volunteer_id.as_deref() {
        Some(vid) => state.store.get_profile(vid).await?,
        None => None,
    };
    let events = state.store.pickup_events_for(&id).await?;

    let summary =
        ReceiptSummary::new(&donation, donor.as_ref(), volunteer.as_ref(), events.last())?;
    let disposition = format!(
        "attachment; filename=\"donation-receipt-{}.txt\"",
        summary.donation_id
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        receipt::render(&summary),
    ))
}

// ─── Images ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImageUploadRequest {
    pub content_type: String,
    /// Base64 (standard alphabet) file contents
    pub data: String,
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ImageUploadRequest>,
) -> Result<(StatusCode, Json<StoredImage>)> {
    // Cheap size check before decoding: base64 inflates by 4/3.
    if body.data.len() / 4 * 3 > storage::MAX_IMAGE_BYTES + 3 {
        return Err(AppError::BadRequest(
            "image is too large. Maximum size is 10MB.".to_string(),
        ));
    }

    let bytes = STANDARD
        .decode(body.data.trim())
        .map_err(|_| AppError::BadRequest("image data is not valid base64".to_string()))?;

    let stored = storage::store_image(
        state.storage.as_ref(),
        &user.user_id,
        &body.content_type,
        &bytes,
    )
    .await?;

    tracing::info!(user_id = %user.user_id, path = %stored.path, "Image uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Remove one of the caller's own uploads.
async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> Result<StatusCode> {
    let owned = path
        .split_once('/')
        .is_some_and(|(owner, _)| owner == user.user_id);
    if !owned {
        return Err(AppError::Unauthorized(
            "images can only be removed by their uploader".to_string(),
        ));
    }

    state.storage.delete(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}
