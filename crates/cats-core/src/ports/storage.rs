//! Storage trait for cat persistence

use crate::types::{Cat, NewCat};
use crate::Result;
use async_trait::async_trait;

/// Cat store
///
/// Every backend must report a missing record as [`StorageError::NotFound`]
/// so the HTTP layer can tell 404 apart from 500.
///
/// [`StorageError::NotFound`]: crate::StorageError::NotFound
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait CatStore: Send + Sync {
    /// Liveness probe for the backend.
    async fn status(&self) -> Result<()>;

    /// Stores a new cat and returns its generated id.
    async fn insert(&self, cat: &NewCat) -> Result<String>;

    async fn select(&self, id: &str) -> Result<Cat>;

    /// Returns at most `limit` cats starting at `offset`.
    /// An empty page is reported as `NotFound`.
    async fn select_all(&self, limit: i64, offset: i64) -> Result<Vec<Cat>>;

    /// Overwrites every field of an existing cat.
    async fn update(&self, id: &str, cat: &NewCat) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Removes every row of `table` and restarts its id sequence.
    async fn purge(&self, table: &str) -> Result<()>;
}
