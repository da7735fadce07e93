/// Service layer
///
/// Services orchestrate validation, ownership checks and store calls. They
/// are cheap to clone (everything inside is an `Arc`) and return
/// [`crate::error::CoreError`] kinds, never transport codes.
///
/// - `auth`: registration, logins, tokens, caller resolution
/// - `user`: profile, password and deactivation for the caller
/// - `project`: owner-scoped project CRUD
/// - `task`: owner-scoped task CRUD, quadrant moves, overdue listing

pub mod auth;
pub mod project;
pub mod task;
pub mod user;

pub use auth::{AuthService, Registration, TokenPair};
pub use project::ProjectService;
pub use task::TaskService;
pub use user::{PasswordChange, ProfileUpdate, UserService};
