//! Rendering error types.

use thiserror::Error;
use volscope_core::VolscopeError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// A voxel grid cannot be represented as a GPU texture.
    #[error("unsupported volume layout: {0}")]
    UnsupportedVolume(String),

    /// A named GPU resource has not been uploaded.
    #[error("{kind} '{name}' is not resident on the GPU")]
    NotResident { kind: &'static str, name: String },

    /// Mapping a readback buffer failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// A pick render was issued outside `begin_pick`/`end_pick`.
    #[error("no pick query in progress")]
    NoPickInProgress,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for VolscopeError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NotResident { kind, name } => VolscopeError::NotFound { kind, name },
            RenderError::TextureCreationFailed(reason) => VolscopeError::ResourceAllocation(reason),
            other => VolscopeError::Render(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_resident_maps_to_not_found() {
        let err: VolscopeError = RenderError::NotResident {
            kind: "volume texture",
            name: "head".into(),
        }
        .into();
        assert!(matches!(
            err,
            VolscopeError::NotFound { kind: "volume texture", ref name } if name == "head"
        ));
    }

    #[test]
    fn test_texture_failure_maps_to_allocation() {
        let err: VolscopeError = RenderError::TextureCreationFailed("too large".into()).into();
        assert!(matches!(err, VolscopeError::ResourceAllocation(_)));

        let err: VolscopeError = RenderError::BufferMapFailed.into();
        assert!(matches!(err, VolscopeError::Render(_)));
    }
}
