//! Cats API Server
//!
//! RESTful CRUD service for cat records under `/cats/v1`, backed by
//! PostgreSQL or a bounded in-memory cache.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod storage;

pub use app::{router, run_server, AppState};
pub use config::Settings;
