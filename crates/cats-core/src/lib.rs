//! Cats Core Library
//!
//! Domain types, the storage port and its error type for the Cats API.

pub mod error;
pub mod ports;
pub mod types;

pub use error::{Result, StorageError};
#[cfg(any(test, feature = "mock"))]
pub use ports::MockCatStore;
pub use ports::CatStore;
pub use types::{Cat, NewCat};
