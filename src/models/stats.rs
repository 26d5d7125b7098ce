//! Dashboard aggregates.
//!
//! Always recomputed by a full scan of the current donation set; nothing is
//! carried between calls, so equal inputs give equal counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Donation, DonationStatus, Role};

/// Counts derived from a donation set (and, for admins, the role mapping).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardStats {
    /// Number of donations scanned
    pub total: u32,
    /// Donation count per status (statuses with no donations are absent)
    #[serde(default)]
    pub by_status: BTreeMap<DonationStatus, u32>,
    /// Profile count per resolved role
    #[serde(default)]
    pub by_role: BTreeMap<Role, u32>,
}

impl DashboardStats {
    /// Scan `donations` and count them by status.
    pub fn from_donations<'a, I>(donations: I) -> Self
    where
        I: IntoIterator<Item = &'a Donation>,
    {
        let mut stats = Self::default();
        for donation in donations {
            stats.total += 1;
            *stats.by_status.entry(donation.status).or_insert(0) += 1;
        }
        stats
    }

    /// Add per-role counts from already-resolved roles.
    pub fn with_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        self.by_role.clear();
        for role in roles {
            *self.by_role.entry(role).or_insert(0) += 1;
        }
        self
    }

    pub fn count(&self, status: DonationStatus) -> u32 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn role_count(&self, role: Role) -> u32 {
        self.by_role.get(&role).copied().unwrap_or(0)
    }
}
