//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate a fit request and select the points it covers
//! - resolve blackbody holds into a free-parameter vector
//! - run the weighted solve and fall back to uniform weights

pub mod engine;

pub use engine::*;
