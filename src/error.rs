//! Crate-wide error type.
//!
//! Every variant maps to a process exit code so the `sed` binary can report
//! failures the same way regardless of which layer raised them.

use thiserror::Error;

use crate::domain::FitKind;

#[derive(Debug, Clone, Error)]
pub enum SedError {
    #[error("malformed scientific literal '{literal}': {reason}")]
    MalformedScientificLiteral { literal: String, reason: String },

    #[error("malformed record{}: {reason}", target_suffix(.target))]
    MalformedRecord {
        target: Option<String>,
        reason: String,
    },

    #[error("invalid fit range: {0}")]
    InvalidFitRange(String),

    #[error("{kind} fit did not converge: {reason}")]
    FitDidNotConverge { kind: FitKind, reason: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("render error: {0}")]
    Render(String),
}

fn target_suffix(target: &Option<String>) -> String {
    match target {
        Some(name) => format!(" for '{name}'"),
        None => String::new(),
    }
}

impl SedError {
    pub fn malformed_record(target: Option<&str>, reason: impl Into<String>) -> Self {
        SedError::MalformedRecord {
            target: target.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        SedError::Persistence(format!("{context}: {err}"))
    }

    /// Exit code reported by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            SedError::MalformedScientificLiteral { .. }
            | SedError::MalformedRecord { .. }
            | SedError::InvalidFitRange(_)
            | SedError::UnknownTarget(_)
            | SedError::Config(_) => 2,
            SedError::FitDidNotConverge { .. } => 3,
            SedError::Persistence(_) | SedError::Render(_) => 4,
        }
    }
}
