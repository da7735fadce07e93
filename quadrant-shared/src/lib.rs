//! # Quadrant Shared Library
//!
//! Core domain of the Quadrant task manager: users own projects, projects own
//! tasks, and every task is classified into one of the four Eisenhower
//! quadrants derived from its urgency and importance flags.
//!
//! ## Module Organization
//!
//! - `config`: Process-wide authentication settings (secret, TTLs, hashing cost)
//! - `error`: Core error taxonomy returned by every service operation
//! - `auth`: Password hashing, JWT issuance/validation, OAuth identity verification
//! - `models`: Users, projects, tasks and their inputs/filters
//! - `store`: Owner-scoped repositories (PostgreSQL and in-memory)
//! - `services`: Authentication, user, project and task orchestration
//! - `db`: Connection pool and migrations
//! - `clock`: Current-time source

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the Quadrant shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
