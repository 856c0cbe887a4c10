//! Error taxonomy for the supervisor.
//!
//! One variant per failure class the caller can meaningfully react to.
//! Secondary errors hit while cleaning up after a primary failure are
//! logged and swallowed so the primary error is never masked.

use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by instance construction, startup, and seed import.
#[derive(Error, Debug)]
pub enum MongoBoxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unresolvable configuration. Raised at construction,
    /// never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation called in a state that does not permit it.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// The server process exited while the readiness window was still
    /// open. Carries the child's exit status.
    #[error("mongod exited during startup ({status})")]
    StartupCrash { status: ExitStatus },

    /// The readiness deadline elapsed without a successful TCP connect
    /// and without an observed crash.
    #[error("mongod did not accept connections within {timeout:?}")]
    StartupTimeout { timeout: Duration },

    /// Seed import produced error output or a non-zero exit. The
    /// instance is left running when this is returned.
    #[error("seed import failed: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, MongoBoxError>;
