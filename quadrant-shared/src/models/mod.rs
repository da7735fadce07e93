/// Domain models
///
/// Plain data types shared by every store backend and service. The SQL lives
/// in [`crate::store::postgres`]; these types only derive `sqlx::FromRow` so
/// rows decode straight into them.
///
/// # Models
///
/// - `user`: accounts, credentials and linked OAuth identities
/// - `project`: named containers owned by one user
/// - `task`: work items classified into an Eisenhower quadrant
///
/// # Example
///
/// ```
/// use quadrant_shared::models::task::Quadrant;
///
/// assert_eq!(Quadrant::from_flags(true, false), Quadrant::Delegate);
/// assert_eq!(Quadrant::Delegate.number(), 3);
/// ```

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod project;
pub mod task;
pub mod user;

/// Default page size
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 1000;

/// An entity that belongs to exactly one user
pub trait Owned {
    fn id(&self) -> Uuid;
    fn owner_id(&self) -> Uuid;
}

/// Offset/limit window over a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Page {
    #[serde(default)]
    #[validate(range(min = 0, message = "must be at least 0"))]
    pub skip: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "must be between 1 and 1000"))]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// Applies the window to an already ordered iterator
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        items
            .skip(self.skip.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .collect()
    }
}

/// Deserializes a present field (even `null`) as `Some`, so callers can tell
/// "clear this value" from "leave it alone"
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Case-insensitive substring match used by in-memory search
pub(crate) fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page: Page = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Page::default());
        assert_eq!(page.limit, 100);
        assert!(page.validate().is_ok());
    }

    #[test]
    fn test_page_bounds() {
        assert!(Page::new(-1, 10).validate().is_err());
        assert!(Page::new(0, 0).validate().is_err());
        assert!(Page::new(0, 1001).validate().is_err());
        assert!(Page::new(5, 1000).validate().is_ok());
    }

    #[test]
    fn test_page_apply() {
        let window = Page::new(2, 3).apply(0..10);
        assert_eq!(window, vec![2, 3, 4]);

        let past_end = Page::new(20, 3).apply(0..10);
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci(Some("Buy MILK"), "milk"));
        assert!(!contains_ci(Some("Buy bread"), "milk"));
        assert!(!contains_ci(None, "milk"));
    }
}
