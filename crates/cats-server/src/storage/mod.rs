//! Storage backends
//!
//! PostgreSQL for durable persistence, DashMap as a bounded TTL cache.
//! Both implement [`cats_core::CatStore`].

pub mod db;
pub mod memory;

pub use db::{PgStore, CATS_TABLE};
pub use memory::CacheStore;
