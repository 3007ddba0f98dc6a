//! Error types.
//!
//! The reactive core and the template rewriter report failures through
//! two small enums. Most "failures" in the reactive core are absorbed as
//! no-ops (untracked reads, self-assignment); only the cases below surface.

use thiserror::Error;

/// Errors produced by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A flush ran more rounds than the configured cap allows.
    ///
    /// The remaining queue was dropped; the effects involved most likely
    /// write state they also read.
    #[error("possible reactive cycle: flush aborted after {rounds} rounds (cap {cap})")]
    CycleDetected { rounds: usize, cap: usize },

    /// An array write addressed a slot past the end of the array.
    #[error("index {index} out of bounds for reactive array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A store or object operation was given a value that is not an object.
    #[error("expected a JSON object")]
    NotAnObject,
}

/// Errors produced by the template rewriter in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptError {
    /// A `${` was never closed.
    #[error("unterminated template expression starting at byte {offset}")]
    UnterminatedExpression { offset: usize },

    /// A template literal was never closed.
    #[error("unterminated template literal starting at byte {offset}")]
    UnterminatedTemplate { offset: usize },

    /// The input did not look like a function, arrow or method.
    #[error("source is not a recognizable function")]
    UnrecognizedFunction,
}
