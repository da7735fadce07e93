/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check and liveness endpoints
/// - `auth`: Registration, logins, token refresh, current user
/// - `users`: Profile, password and account deactivation for the caller
/// - `projects`: Project CRUD
/// - `tasks`: Task CRUD, quadrant moves, status changes, overdue listing

pub mod auth;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

use quadrant_shared::models::{Page, DEFAULT_LIMIT};
use serde::Serialize;

// Query strings are decoded without `#[serde(flatten)]`, which would hand
// numbers to the inner struct as strings
fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Paginated list envelope shared by the list endpoints
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    /// Matching rows before pagination
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(total: i64, page: Page, items: Vec<T>) -> Self {
        Self {
            total,
            skip: page.skip,
            limit: page.limit,
            items,
        }
    }
}
