//! Dust and synchrotron-like emission models.
//!
//! Models are implemented as small, pure functions so that the fitter and the
//! renderer can share them.

pub mod model;

pub use model::*;
