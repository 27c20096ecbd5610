//! Error types for the environment abstraction layer.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer itself (as
/// distinct from engine-domain errors, which live in `conj_core::EngineError`).
#[derive(Debug, Error)]
pub enum EnvError {
    /// A context operation failed in a way specific to its implementation
    /// (e.g. the simulation harness ran past its configured horizon).
    #[error("context error: {0}")]
    ContextError(String),

    /// Operation timed out.
    #[error("timeout after {0}ms")]
    Timeout(u64),
}
