//! Numerical core: damped least-squares steps and the Levenberg–Marquardt loop.

pub mod lm;
pub mod ols;

pub use lm::*;
pub use ols::*;
