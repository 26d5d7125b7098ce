// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Donation receipts for completed pickups.

use crate::error::{AppError, Result};
use crate::models::{Donation, DonationStatus, PickupEvent, Profile};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Everything printed on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptSummary {
    pub donation_id: String,
    pub donor_name: String,
    pub pickup_address: String,
    pub item_category: String,
    pub item_description: String,
    pub quantity: u32,
    pub volunteer_name: String,
    pub pickup_date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

/// First eight characters of the ID, upper-cased.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

impl ReceiptSummary {
    /// Assemble a summary. Fails unless the donation is completed.
    pub fn new(
        donation: &Donation,
        donor: Option<&Profile>,
        volunteer: Option<&Profile>,
        pickup: Option<&PickupEvent>,
    ) -> Result<Self> {
        if donation.status != DonationStatus::Completed {
            return Err(AppError::InvalidTransition(format!(
                "receipts are only issued for completed donations (this one is {})",
                donation.status
            )));
        }

        Ok(Self {
            donation_id: short_id(&donation.id),
            donor_name: donor.map_or_else(|| "Donor".to_string(), |p| p.full_name.clone()),
            pickup_address: donation.pickup_address.clone(),
            item_category: donation.item_category.clone(),
            item_description: donation
                .item_description
                .clone()
                .unwrap_or_else(|| donation.item_category.clone()),
            quantity: donation.item_quantity,
            volunteer_name: volunteer
                .map_or_else(|| "Volunteer".to_string(), |p| p.full_name.clone()),
            pickup_date: donation.preferred_date,
            completed_at: pickup.map_or(donation.updated_at, |e| e.created_at),
        })
    }
}

/// Render a receipt as a plain-text document.
pub fn render(summary: &ReceiptSummary) -> Vec<u8> {
    let mut doc = String::new();
    let rule = "-".repeat(48);

    // Writing to a String cannot fail.
    let _ = writeln!(doc, "DonateConnect");
    let _ = writeln!(doc, "Donation Receipt");
    let _ = writeln!(doc, "{}", rule);
    let _ = writeln!(doc, "{:<16}{}", "Donation ID:", summary.donation_id);
    let _ = writeln!(
        doc,
        "{:<16}{}",
        "Completed On:",
        summary.completed_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Donor Information");
    let _ = writeln!(doc, "{:<16}{}", "Name:", summary.donor_name);
    let _ = writeln!(doc, "{:<16}{}", "Pickup Address:", summary.pickup_address);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Donation Details");
    let _ = writeln!(doc, "{:<16}{}", "Category:", summary.item_category);
    let _ = writeln!(doc, "{:<16}{}", "Items:", summary.item_description);
    let _ = writeln!(doc, "{:<16}{}", "Quantity:", summary.quantity);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "Pickup By");
    let _ = writeln!(doc, "{:<16}{}", "Volunteer:", summary.volunteer_name);
    let _ = writeln!(
        doc,
        "{:<16}{}",
        "Pickup Date:",
        summary.pickup_date.format("%-m/%-d/%Y")
    );
    let _ = writeln!(doc, "{}", rule);
    let _ = writeln!(doc, "Thank you for your generous donation!");
    let _ = writeln!(doc, "Your contribution makes a difference in our community.");

    doc.into_bytes()
}
