//! Error handling for bqpivot

use thiserror::Error;

/// Main error type for pivot generation and execution
#[derive(Error, Debug)]
pub enum PivotError {
    /// Bad or missing construction parameters. Always a caller bug.
    #[error("Invalid pivot spec: {0}")]
    InvalidSpec(String),

    /// Category discovery failed or returned nothing usable.
    #[error("Category discovery failed: {0}")]
    Discovery(String),

    /// The warehouse rejected or failed to run a statement. The message is
    /// the warehouse's own, unmodified.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Destination table {0} already exists and overwrite was not requested")]
    DestinationConflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PivotError {
    /// Process exit code the command-line surface uses for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            PivotError::InvalidSpec(_) => 2,
            PivotError::Discovery(_) => 3,
            PivotError::Execution(_) => 4,
            PivotError::DestinationConflict(_) => 5,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for PivotError {
    fn from(err: serde_json::Error) -> Self {
        PivotError::Serialization(err.to_string())
    }
}

/// Result type alias for pivot operations
pub type PivotResult<T> = std::result::Result<T, PivotError>;

/// Macro for creating invalid spec errors
#[macro_export]
macro_rules! invalid_spec_err {
    ($msg:expr) => {
        $crate::common::error::PivotError::InvalidSpec($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PivotError::InvalidSpec(format!($fmt, $($arg)*))
    };
}

/// Macro for creating execution errors
#[macro_export]
macro_rules! execution_err {
    ($msg:expr) => {
        $crate::common::error::PivotError::Execution($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PivotError::Execution(format!($fmt, $($arg)*))
    };
}
