use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("insufficient data: {what} needs at least {needed} rows, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("unexpected column outside the feature schema: {0}")]
    UnexpectedColumn(String),

    #[error("column order drift at position {position}: expected {expected}, found {found}")]
    ColumnOrder {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("undefined metric {metric}: {reason}")]
    UndefinedMetric {
        metric: &'static str,
        reason: String,
    },

    #[error("length mismatch: {left} has {left_len} rows but {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("config error: {0}")]
    InvalidConfig(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

pub(crate) fn ensure_same_len(
    left: &'static str,
    left_len: usize,
    right: &'static str,
    right_len: usize,
) -> PipelineResult<()> {
    if left_len != right_len {
        return Err(PipelineError::LengthMismatch {
            left,
            left_len,
            right,
            right_len,
        });
    }
    Ok(())
}
