use std::path::PathBuf;

/// Failures reported by shader, preview and manager operations.
///
/// Every variant is recoverable: the operation that produced it has already
/// logged the condition and left the manager's collections consistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("shader source is empty")]
    EmptySource,
    #[error("failed to compile shader: {0}")]
    CompileFailure(String),
    #[error("failed to create pixel-shader program: {0}")]
    ProgramCreationFailure(String),
    #[error("failed to create sampler: {0}")]
    SamplerCreationFailure(String),
    #[error("failed to decode image {path}: {reason}")]
    ImageDecodeFailure { path: PathBuf, reason: String },
    #[error("failed to upload texture: {0}")]
    TextureUploadFailure(String),
    #[error("failed to create shader resource view: {0}")]
    ShaderResourceViewFailure(String),
    #[error("failed to read shader source {path}: {reason}")]
    SourceReadFailure { path: PathBuf, reason: String },
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

impl ResourceError {
    pub(crate) fn shader_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "shader",
            id: id.to_string(),
        }
    }

    pub(crate) fn preview_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind: "preview",
            id: id.to_string(),
        }
    }

    /// True when the image decoded but the texture or its view could not be created.
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            Self::TextureUploadFailure(_) | Self::ShaderResourceViewFailure(_)
        )
    }
}
