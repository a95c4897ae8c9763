//! Error types for the simulation harness.

use thiserror::Error;

/// Errors raised by the simulation harness.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Failed to write export: {0}")]
    Export(#[from] std::io::Error),

    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}
