// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Explicit actor context.
//!
//! Every engine and projection call takes the acting party as an argument.
//! Roles come from the `user_roles` mapping only; `Profile.role` is never
//! read here.

use crate::db::RecordStore;
use crate::error::{AppError, Result};
use crate::models::Role;

/// An authenticated user together with their resolved roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    /// Mapping entries oldest first; never empty.
    pub roles: Vec<Role>,
}

impl UserContext {
    /// Build a context from mapping entries. A user without entries is a
    /// donor.
    pub fn new(user_id: impl Into<String>, roles: Vec<Role>) -> Self {
        let roles = if roles.is_empty() {
            vec![Role::Donor]
        } else {
            roles
        };
        Self {
            user_id: user_id.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admin or NGO.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.is_admin())
    }

    /// The first mapped role.
    pub fn primary_role(&self) -> Role {
        self.roles.first().copied().unwrap_or_default()
    }

    /// Fail with `Unauthorized` unless the user holds `role`.
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!("{} role required", role)))
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Unauthorized("admin or ngo role required".to_string()))
        }
    }
}

/// Who is asking for a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The platform itself (volunteer-visible broadcast).
    System,
    User(UserContext),
}

impl Actor {
    pub fn user(&self) -> Option<&UserContext> {
        match self {
            Actor::System => None,
            Actor::User(ctx) => Some(ctx),
        }
    }

    /// Identifier for logs.
    pub fn label(&self) -> &str {
        match self {
            Actor::System => "system",
            Actor::User(ctx) => &ctx.user_id,
        }
    }
}

/// Resolve a user's context from the role mapping.
pub async fn resolve_user(store: &dyn RecordStore, user_id: &str) -> Result<UserContext> {
    if user_id.is_empty() {
        return Err(AppError::AuthenticationRequired);
    }

    let mut roles: Vec<Role> = Vec::new();
    for entry in store.roles_for_user(user_id).await? {
        if !roles.contains(&entry.role) {
            roles.push(entry.role);
        }
    }

    tracing::debug!(user_id, roles = ?roles, "Resolved user roles");
    Ok(UserContext::new(user_id, roles))
}
