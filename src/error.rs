//! Error types for the SV evidence-graph engine.

use std::io;
use thiserror::Error;

/// Errors surfaced by stats parsing, scanning, and graph maintenance.
///
/// Propagation policy: the scanner never raises on biological oddities (a
/// read that simply doesn't support an SV observation yields `Ok(None)`,
/// not an error); it raises only on structural corruption. The graph
/// engine raises on invariant violation and otherwise returns values.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("input corruption: {0}")]
    InputCorruption(String),

    #[error("insufficient data to estimate pair statistics: {0}")]
    StatsUnderflow(String),

    #[error("graph invariant violated: {0}")]
    InvariantViolation(String),

    #[error("operation cancelled")]
    CancellationRequested,
}

pub type Result<T> = std::result::Result<T, GraphError>;
