use thiserror::Error;

/// Why a level could not be generated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Rejected before any attempt was made.
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),
    #[error("no valid level after {attempts} attempts, last failure: {last_failure}")]
    RetriesExhausted { attempts: u32, last_failure: String },
}
