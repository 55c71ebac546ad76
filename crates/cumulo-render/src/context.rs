//! The graphics device context.
//!
//! [`Context`] is the narrow capability interface the rest of the library
//! depends on: typed device/queue access plus the validation queries the
//! volume texture layer needs (maximum 3D texture dimension, the supported
//! pixel format and datatype sets). Nothing outside this crate touches a raw
//! adapter.

use crate::error::{RenderError, RenderResult};
use crate::texture::PixelDatatype;

/// Pixel formats accepted for volume texture uploads.
const VOLUME_FORMATS: &[wgpu::TextureFormat] = &[
    wgpu::TextureFormat::R8Unorm,
    wgpu::TextureFormat::Rg8Unorm,
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::R32Float,
];

/// Capability snapshot used by pure validation, testable with stubbed values.
#[derive(Debug, Clone)]
pub struct VolumeCaps {
    /// Device maximum for each 3D texture dimension.
    pub max_texture_dimension_3d: u32,
    /// Supported pixel formats.
    pub formats: Vec<wgpu::TextureFormat>,
    /// Supported source datatypes.
    pub datatypes: Vec<PixelDatatype>,
}

impl VolumeCaps {
    /// Returns whether the format is in the supported set.
    #[must_use]
    pub fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Returns whether the datatype is in the supported set.
    #[must_use]
    pub fn supports_datatype(&self, datatype: PixelDatatype) -> bool {
        self.datatypes.contains(&datatype)
    }
}

/// The graphics device context shared by every GPU resource.
pub struct Context {
    /// The wgpu instance.
    pub instance: wgpu::Instance,
    /// The wgpu adapter.
    pub adapter: wgpu::Adapter,
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu queue.
    pub queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    max_texture_dimension_3d: u32,
}

impl Context {
    /// Wraps an already-created device, recording the render target format
    /// draw pipelines will be built against.
    #[must_use]
    pub fn new(
        instance: wgpu::Instance,
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        let max_texture_dimension_3d = device.limits().max_texture_dimension_3d;
        Self {
            instance,
            adapter,
            device,
            queue,
            target_format,
            depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            max_texture_dimension_3d,
        }
    }

    /// Creates a headless context (no surface).
    ///
    /// # Errors
    /// Fails when no adapter is available or device creation fails.
    pub async fn headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("cumulo device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        // The ray-march shaders gamma-encode their output themselves, so the
        // headless target is a non-sRGB format.
        Ok(Self::new(
            instance,
            adapter,
            device,
            queue,
            wgpu::TextureFormat::Rgba8Unorm,
        ))
    }

    /// The color format draw pipelines render into.
    #[must_use]
    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// The depth-stencil format draw pipelines are built against.
    #[must_use]
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    /// Device maximum for each 3D texture dimension.
    #[must_use]
    pub fn max_texture_dimension_3d(&self) -> u32 {
        self.max_texture_dimension_3d
    }

    /// Returns whether the format is accepted for volume uploads.
    #[must_use]
    pub fn supports_volume_format(&self, format: wgpu::TextureFormat) -> bool {
        VOLUME_FORMATS.contains(&format)
    }

    /// Snapshot of the validation-relevant capabilities.
    #[must_use]
    pub fn volume_caps(&self) -> VolumeCaps {
        VolumeCaps {
            max_texture_dimension_3d: self.max_texture_dimension_3d,
            formats: VOLUME_FORMATS.to_vec(),
            datatypes: vec![PixelDatatype::UnsignedByte, PixelDatatype::Float32],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_format_membership() {
        let caps = VolumeCaps {
            max_texture_dimension_3d: 256,
            formats: vec![wgpu::TextureFormat::R8Unorm],
            datatypes: vec![PixelDatatype::UnsignedByte],
        };
        assert!(caps.supports_format(wgpu::TextureFormat::R8Unorm));
        assert!(!caps.supports_format(wgpu::TextureFormat::Rgba32Float));
        assert!(caps.supports_datatype(PixelDatatype::UnsignedByte));
        assert!(!caps.supports_datatype(PixelDatatype::Float32));
    }
}
