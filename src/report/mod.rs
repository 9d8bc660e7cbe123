//! Reporting utilities: formatted terminal output for targets and fits.

pub mod format;

pub use format::*;
