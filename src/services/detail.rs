// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-donation detail as shown to the people involved.

use crate::error::{AppError, Result};
use crate::models::{Donation, DonationStatus, PickupEvent, Profile};
use crate::services::session::UserContext;
use serde::Serialize;

/// Mask all but the last four digits: `***-***-1234`.
pub fn mask_phone(phone: Option<&str>) -> String {
    let Some(phone) = phone else {
        return "Not provided".to_string();
    };
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return "Not provided".to_string();
    }
    if digits.len() < 4 {
        return "***-****".to_string();
    }
    let last_four: String = digits[digits.len() - 4..].iter().collect();
    format!("***-***-{}", last_four)
}

pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("Donor")
}

/// Turn-by-turn link to the pickup point.
pub fn navigation_url(donation: &Donation) -> Option<String> {
    donation.location.map(|p| {
        format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}",
            p.lat, p.lng
        )
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonorContact {
    pub name: String,
    pub phone: String,
    /// Whether `phone` is the full number
    pub revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationDetail {
    pub donation: Donation,
    pub donor: DonorContact,
    pub navigation_url: Option<String>,
    pub pickup_events: Vec<PickupEvent>,
}

/// Full contact is shown once the pickup is under way.
fn contact_revealed(status: DonationStatus) -> bool {
    matches!(status, DonationStatus::InProgress | DonationStatus::Completed)
}

/// Build the detail view of `donation` for `viewer`.
///
/// Visible to the donor, the assigned volunteer, admins, and any volunteer
/// while the donation is still claimable.
pub fn donation_detail(
    viewer: &UserContext,
    donation: Donation,
    donor: Option<&Profile>,
    pickup_events: Vec<PickupEvent>,
) -> Result<DonationDetail> {
    let is_donor = donation.donor_id == viewer.user_id;
    let may_view = is_donor
        || viewer.is_admin()
        || donation.is_assigned_to(&viewer.user_id)
        || (donation.status.is_claimable()
            && viewer.has_role(crate::models::Role::Volunteer));
    if !may_view {
        return Err(AppError::Unauthorized(
            "not a party to this donation".to_string(),
        ));
    }

    let full_name = donor.map(|p| p.full_name.as_str()).unwrap_or("");
    let phone = donor.and_then(|p| p.phone.as_deref());
    let revealed = is_donor || viewer.is_admin() || contact_revealed(donation.status);

    let contact = if revealed {
        DonorContact {
            name: if full_name.is_empty() { "Donor".to_string() } else { full_name.to_string() },
            phone: phone.unwrap_or("Not provided").to_string(),
            revealed: true,
        }
    } else {
        DonorContact {
            name: first_name(full_name).to_string(),
            phone: mask_phone(phone),
            revealed: false,
        }
    };

    Ok(DonationDetail {
        navigation_url: navigation_url(&donation),
        donation,
        donor: contact,
        pickup_events,
    })
}
