/// Persistence ports
///
/// Services talk to storage only through the traits defined here. Two
/// backends implement them:
///
/// - [`postgres::PgStore`]: sqlx over PostgreSQL. Unique constraints, the
///   credential CHECK and cascading foreign keys are the final authority.
/// - [`memory::MemoryStore`]: an in-process store with the same constraint
///   semantics, used by tests and local runs.
///
/// Owner scoping is written once per backend in [`OwnedRepository`], which is
/// generic over the entity type. [`ProjectStore`] and [`TaskStore`] extend it
/// with their entity-specific queries.
///
/// Every mutating method is a single atomic step: it either fully applies or
/// leaves storage untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::project::{NewProject, Project, ProjectChanges};
use crate::models::task::{NewTask, Task, TaskChanges, TaskCountFilter, TaskFilter};
use crate::models::user::{NewUser, User, UserChanges};
use crate::models::{Owned, Page};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Constraint names shared by both backends
pub mod constraints {
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const USERS_EXTERNAL_ID: &str = "users_external_id_key";
    pub const USERS_CREDENTIAL: &str = "users_credential_check";
    pub const TASKS_PROJECT_OWNER: &str = "tasks_project_owner_fkey";
}

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced row does not exist (or belongs to another owner)
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// A CHECK constraint rejected the row
    #[error("Check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    /// Anything else from the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation_on(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner-scoped access shared by every owned entity
///
/// Rows owned by someone else are indistinguishable from absent rows.
#[async_trait]
pub trait OwnedRepository<T>: Send + Sync
where
    T: Owned + Send + Sync + 'static,
{
    /// Fetches `id` only if it belongs to `owner_id`
    async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<T>>;

    /// Deletes `id` only if it belongs to `owner_id`; true when a row went away
    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> StoreResult<bool>;
}

/// Project persistence
#[async_trait]
pub trait ProjectStore: OwnedRepository<Project> {
    /// Owner's projects in creation order; `search` matches name or
    /// description, case-insensitively
    async fn list_projects(
        &self,
        owner_id: Uuid,
        search: Option<&str>,
        page: Page,
    ) -> StoreResult<Vec<Project>>;

    async fn count_projects(&self, owner_id: Uuid, search: Option<&str>) -> StoreResult<i64>;

    async fn create_project(&self, owner_id: Uuid, input: &NewProject) -> StoreResult<Project>;

    /// `None` when the project is absent for this owner
    async fn update_project(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &ProjectChanges,
    ) -> StoreResult<Option<Project>>;

    async fn count_project_tasks(&self, project_id: Uuid, owner_id: Uuid) -> StoreResult<i64>;
}

/// Task persistence
#[async_trait]
pub trait TaskStore: OwnedRepository<Task> {
    /// Owner's tasks matching every filter, newest first
    async fn list_tasks(
        &self,
        owner_id: Uuid,
        filter: &TaskFilter,
        page: Page,
    ) -> StoreResult<Vec<Task>>;

    async fn count_tasks(&self, owner_id: Uuid, filter: &TaskCountFilter) -> StoreResult<i64>;

    /// Fails with `ForeignKeyViolation` unless `input.project_id` belongs to
    /// `owner_id`
    async fn create_task(&self, owner_id: Uuid, input: &NewTask) -> StoreResult<Task>;

    /// `None` when the task is absent for this owner, or when the change moves
    /// it into a project the owner does not hold (nothing is written then)
    async fn update_task(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: &TaskChanges,
    ) -> StoreResult<Option<Task>>;

    /// Tasks with `deadline < now` that are not done, earliest deadline first
    async fn list_overdue(&self, owner_id: Uuid, now: DateTime<Utc>) -> StoreResult<Vec<Task>>;
}

/// Identity persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>>;

    /// Fails with `UniqueViolation` on a duplicate email or external id and
    /// `CheckViolation` when the user would have no credential at all
    async fn create_user(&self, input: &NewUser) -> StoreResult<User>;

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}
