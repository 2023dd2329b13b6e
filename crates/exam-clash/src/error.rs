//! Error types for exam-clash operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClashError {
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid time range: start {start} is not before end {end}")]
    InvalidRange { start: String, end: String },
}

pub type Result<T> = std::result::Result<T, ClashError>;
