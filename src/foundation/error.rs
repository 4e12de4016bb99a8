/// Convenience result type used across the crate.
pub type DepthResult<T> = Result<T, DepthError>;

/// Top-level error taxonomy used by reconstruction APIs.
///
/// Programming-contract violations (mixing nodes from two shader graphs, channel selection
/// out of range, non-finite literals) are not represented here: they panic at the call site.
/// Superseded work is not an error either; see [`crate::RenderGeneration`].
#[derive(thiserror::Error, Debug)]
pub enum DepthError {
    /// Invalid caller-provided data or options.
    #[error("validation error: {0}")]
    Validation(String),

    /// Raster backend failures (adapter, device, pipeline creation, readback).
    #[error("backend error: {0}")]
    Backend(String),

    /// Failures while evaluating a program or running integration workers.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepthError {
    /// Build a [`DepthError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DepthError::Backend`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Build a [`DepthError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
