//! Error kinds raised by the reconstruction pipeline.

use thiserror::Error;

/// Errors raised while configuring or running the reconstruction pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A module's `Init` could not find a required configuration key, found one with the wrong
    /// shape, or two modules tried to export the same array name. Fatal at `Init`.
    #[error("config error in module '{module}': {detail}")]
    Config {
        /// Name of the module whose configuration block caused the error.
        module: String,
        /// Human-readable detail, naming the offending key where applicable.
        detail: String,
    },

    /// A module imported an array name that no earlier module exports. Fatal at `Init`.
    #[error("module '{module}' failed to resolve array '{array}': no module exports it")]
    Resolve {
        /// Name of the module that requested the import.
        module: String,
        /// Array path that could not be resolved.
        array: String,
    },

    /// An event failed basic consistency checks (inconsistent mother/daughter indices, NaN
    /// kinematics). The event is skipped and a counter in [`crate::pipeline::RunStats`] is
    /// incremented; this is not fatal to the run.
    #[error("malformed input event: {0}")]
    Input(String),

    /// The external event generator or clustering library raised during `Process`. The event is
    /// skipped.
    #[error("external collaborator failed: {0}")]
    External(String),

    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
