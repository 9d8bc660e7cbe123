//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - typed target records and their uncertainty cells (`TargetRecord`, `Uncertainty`)
//! - model parameters and holds (`ModelParams`, `HeldParams`)
//! - fit requests and outputs (`FitRequest`, `FitOutcome`, `SavedFit`)
//! - telescope point styles (`PointStyleTable`)

pub mod types;

pub use types::*;
