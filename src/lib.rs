//! `sed-fit` library crate.
//!
//! The binary (`sed`) is a thin wrapper around this library so that:
//!
//! - parsing, fitting and persistence are testable without spawning processes
//! - stores and renderers can be swapped behind their traits

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod parse;
pub mod render;
pub mod report;
pub mod store;
pub mod style;
pub mod target;
