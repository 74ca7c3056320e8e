//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

/// Configuration-level failures. Data problems (missing joins, bad dates,
/// non-numeric measures) never surface here; they degrade to blanks and zeros.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Pivot has no value fields")]
    NoValueFields,

    #[error("Invalid field rules: {0}")]
    Rules(#[from] serde_json::Error),
}
