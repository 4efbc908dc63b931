//! Error types for the BNPL engine.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during engine operation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: bnpl-engine <operations.csv> [--dashboard]")]
    MissingArgument,

    /// Unrecognized command-line flag
    #[error("Unknown argument '{0}'. Usage: bnpl-engine <operations.csv> [--dashboard]")]
    UnknownArgument(String),
}

/// Reasons a payment attempt is refused.
///
/// These map one-to-one onto the conflict cases a payment endpoint would
/// surface to a customer; the engine logs them and skips the record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayError {
    /// The plan has no installment with the requested sequence number
    #[error("no installment with sequence {0}")]
    UnknownSequence(u32),

    /// The installment was already paid
    #[error("installment {0} already paid")]
    AlreadyPaid(u32),

    /// The plan is no longer accepting payments
    #[error("plan is not active")]
    PlanNotActive,

    /// An earlier installment is still unpaid
    #[error("installment {0} must be paid first")]
    PreviousUnpaid(u32),
}
