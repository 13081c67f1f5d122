//! Role-based access control.
//!
//! Roles form an open string set. There is no hierarchy: every guarded
//! operation lists the roles it admits, and `admin` is only allowed where it
//! is listed.

use crate::security::error::{SecurityError, SecurityResult};
use crate::security::token::TokenClaims;

/// Well-known role names.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const ANALYST: &str = "analyst";
    pub const VIEWER: &str = "viewer";
    pub const USER: &str = "user";

    pub const ALL: &[&str] = &[ADMIN, ANALYST, VIEWER, USER];
}

/// Allowed role sets per guarded operation.
pub mod policy {
    use super::roles::*;

    pub const ADMIN_ONLY: &[&str] = &[ADMIN];
    pub const DECISION_WRITERS: &[&str] = &[ADMIN, ANALYST];
    pub const ETHICS_EVALUATORS: &[&str] = &[ADMIN, ANALYST];
    pub const READERS: &[&str] = &[ADMIN, ANALYST, VIEWER, USER];
}

/// Admit `claims` iff its role is one of `allowed_roles`.
pub fn authorize<'a>(claims: &'a TokenClaims, allowed_roles: &[&str]) -> SecurityResult<&'a TokenClaims> {
    if allowed_roles.iter().any(|r| *r == claims.role) {
        Ok(claims)
    } else {
        tracing::warn!(
            target: "audit",
            event = "forbidden",
            principal = %claims.principal_id,
            role = %claims.role,
            "Role not permitted"
        );
        Err(SecurityError::Forbidden)
    }
}
