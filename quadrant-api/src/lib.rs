//! # Quadrant API Server Library
//!
//! HTTP presentation layer over the `quadrant-shared` services.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder, bearer authentication
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
