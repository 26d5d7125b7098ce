// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod donation;
pub mod pickup_event;
pub mod profile;
pub mod stats;

pub use donation::{Donation, DonationStatus, GeoPoint, NewDonation, TimeSlot};
pub use pickup_event::PickupEvent;
pub use profile::{Profile, Role, UserRole};
pub use stats::DashboardStats;
