//! Error types for report parsing and checking

use crate::domain::types::DeviceId;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// CSV report could not be turned into typed rows
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report is empty")]
    Empty,

    #[error("{table} table has no header")]
    MissingHeader { table: &'static str },

    #[error("{table} table is missing column {column:?}")]
    MissingColumn { table: &'static str, column: &'static str },

    #[error("line {line}: {column:?} is not a number: {value:?}")]
    InvalidNumber { line: usize, column: &'static str, value: String },

    #[error("line {line}: {column:?} is not a boolean: {value:?}")]
    InvalidBool { line: usize, column: &'static str, value: String },

    #[error("line {line}: malformed csv: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },
}

/// Report content disagrees with the expected visits
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("{context}: expected {expected}, got {actual}")]
    Mismatch { context: String, expected: String, actual: String },

    #[error("report ran out of visit rows, still expected {expected}")]
    ReportExhausted { expected: String },

    #[error("device {0} not in report")]
    MissingDevice(DeviceId),

    #[error("device {device} has no {animal} summary")]
    MissingAnimal { device: DeviceId, animal: String },

    #[error("device {device} {animal} has no visit #{index}")]
    MissingVisit { device: DeviceId, animal: String, index: usize },

    #[error(
        "{animal} visit #{index} starts {} which is within {interval_secs}s of visit #{} ending {}",
        .start.to_rfc3339(), .index + 1, .previous_end.to_rfc3339()
    )]
    VisitGap {
        animal: String,
        index: usize,
        start: DateTime<FixedOffset>,
        previous_end: DateTime<FixedOffset>,
        interval_secs: i64,
    },

    #[error("{animal} visit #{index} has no {file_name} audio event")]
    MissingAudioEvent { animal: String, index: usize, file_name: String },
}

impl CheckError {
    pub fn mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        CheckError::Mismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

/// Fail with `Mismatch` unless both sides are equal
pub fn ensure_eq<T>(context: impl Into<String>, expected: T, actual: T) -> Result<(), CheckError>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(CheckError::mismatch(context, expected, actual))
    }
}
