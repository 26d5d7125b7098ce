// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pickup completion audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status label written on completion events.
pub const PICKUP_COMPLETED: &str = "completed";

/// Append-only record of a completed pickup. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupEvent {
    pub id: String,
    pub donation_id: String,
    pub volunteer_id: String,
    pub status: String,
    /// URL of the proof photo
    pub proof_image: Option<String>,
    /// Base64 signature capture
    pub signature_data: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
