//! Data sources beyond the record store.
//!
//! - seeded synthetic survey generation (`sample`)

pub mod sample;

pub use sample::*;
