//! HTTP handlers

pub mod cats;
pub mod health;

pub use health::health;
