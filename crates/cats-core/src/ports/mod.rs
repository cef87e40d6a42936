//! Port traits (interfaces) for dependency injection

pub mod storage;

#[cfg(any(test, feature = "mock"))]
pub use storage::MockCatStore;
pub use storage::CatStore;
