//! Rendering error types.

use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// A texture dimension is out of range for the device.
    #[error("invalid {dimension} for 3D texture: {value} (must be in 1..={max})")]
    InvalidDimension {
        /// Which dimension failed ("width", "height", or "depth").
        dimension: &'static str,
        /// The rejected value.
        value: i64,
        /// The device maximum.
        max: u32,
    },

    /// The requested pixel format is not in the supported set.
    #[error("unsupported pixel format for 3D textures: {0:?}")]
    InvalidPixelFormat(wgpu::TextureFormat),

    /// The source datatype is not in the supported set.
    #[error("unsupported pixel datatype for 3D textures: {0:?}")]
    InvalidPixelDatatype(crate::texture::PixelDatatype),

    /// The source buffer does not match the declared dimensions.
    #[error("source buffer holds {actual} bytes, expected {expected}")]
    SourceSizeMismatch {
        /// Bytes required by the declared extent and format.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Surface outdated.
    #[error("surface outdated")]
    SurfaceOutdated,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,

    /// Frame capture failed.
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
