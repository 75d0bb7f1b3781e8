//! # trellis-core
//! Foundation types and traits for the Trellis reward engine.

pub mod constants;
pub mod error;
pub mod schedule;
pub mod store;
pub mod traits;
pub mod types;
