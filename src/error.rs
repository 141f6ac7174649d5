//! Renderer error types

use crate::backend::BackendError;
use thiserror::Error;

/// Errors surfaced by the rendering pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A shader or asset identifier could not be resolved at startup
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A render target failed to allocate its attachments
    #[error("GPU resource error in {target}: {source}")]
    GpuResource {
        target: String,
        #[source]
        source: BackendError,
    },
    /// A target was enabled or drawn into while invalid
    #[error("Render target {0} is invalid")]
    InvalidTarget(String),
    #[error("Renderer used before initialize")]
    NotInitialized,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;
