//! Error types for the decoder core.
//!
//! Expected, non-fatal conditions (an extension that does not apply, a
//! cube-pruning cell that produces no hypothesis) are represented as
//! `Option`, not errors. Overlapping coverage during extension is a
//! programming error and panics. Everything that aborts a sentence but
//! must leave other sentences unaffected goes through `DecodeError`.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A feature function failed while scoring a transition. Aborts the
    /// current sentence only; shared models are never mutated.
    #[error("feature function `{feature}` failed: {message}")]
    Model { feature: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
