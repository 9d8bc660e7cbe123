//! Survey text parsing.
//!
//! - scientific-notation literals (`numeric`)
//! - one target's raw row group into a typed record (`record`)

pub mod numeric;
pub mod record;

pub use numeric::*;
pub use record::*;
