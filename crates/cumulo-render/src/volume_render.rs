//! GPU uniform blocks and bindings for the volume ray-march programs.

use std::sync::Arc;

use cumulo_core::raymarch::{CloudParams, IsosurfaceParams};

use crate::shader::ShaderProgram;
use crate::texture::VolumeTexture;

/// Uniforms for the cloud (alpha compositing) shader.
/// Layout must match WGSL `CloudUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct CloudUniforms {
    /// Model transform matrix.
    pub model: [[f32; 4]; 4],
    /// Model-view-projection matrix.
    pub mvp: [[f32; 4]; 4],
    /// Camera position in object space (xyz; w unused).
    pub camera_object: [f32; 4],
    /// Half extents of the bounding box (xyz; w unused).
    pub half_dim: [f32; 4],
    /// Base cloud color (rgb; w unused).
    pub base: [f32; 4],
    /// Density threshold center.
    pub threshold: f32,
    /// Smoothstep half-width around the threshold.
    pub range: f32,
    /// Per-step opacity multiplier.
    pub opacity: f32,
    /// Step count across one cell span.
    pub steps: f32,
    /// Frame counter driving the temporal jitter.
    pub frame: f32,
    /// Logical volume edge length in texels.
    pub slice_size: f32,
    /// Padding to 16-byte alignment.
    pub _pad0: f32,
    pub _pad1: f32,
}

impl Default for CloudUniforms {
    fn default() -> Self {
        let params = CloudParams::default();
        Self {
            model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            mvp: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_object: [0.0, 0.0, 3.0, 0.0],
            half_dim: [0.5, 0.5, 0.5, 0.0],
            base: [0.474, 0.541, 0.627, 0.0], // #798aa0
            threshold: params.threshold,
            range: params.range,
            opacity: params.opacity,
            steps: params.steps,
            frame: params.frame,
            slice_size: 128.0,
            _pad0: 0.0,
            _pad1: 0.0,
        }
    }
}

/// Uniforms for the iso-surface (first hit) shader.
/// Layout must match WGSL `IsosurfaceUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct IsosurfaceUniforms {
    /// Model transform matrix.
    pub model: [[f32; 4]; 4],
    /// Model-view-projection matrix.
    pub mvp: [[f32; 4]; 4],
    /// Camera position in object space (xyz; w unused).
    pub camera_object: [f32; 4],
    /// Half extents of the bounding box (xyz; w unused).
    pub half_dim: [f32; 4],
    /// Density value defining the surface.
    pub threshold: f32,
    /// Step count across one cell span.
    pub steps: f32,
    /// Logical volume edge length in texels.
    pub slice_size: f32,
    /// Padding to 16-byte alignment.
    pub _pad0: f32,
}

impl Default for IsosurfaceUniforms {
    fn default() -> Self {
        let params = IsosurfaceParams::default();
        Self {
            model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            mvp: glam::Mat4::IDENTITY.to_cols_array_2d(),
            camera_object: [0.0, 0.0, 3.0, 0.0],
            half_dim: [0.5, 0.5, 0.5, 0.0],
            threshold: params.threshold,
            steps: params.steps,
            slice_size: 128.0,
            _pad0: 0.0,
        }
    }
}

/// Builds the bind group tying a uniform buffer and a volume texture to a
/// compiled program.
#[must_use]
pub fn create_volume_bind_group(
    device: &wgpu::Device,
    program: &ShaderProgram,
    uniform_buffer: &wgpu::Buffer,
    texture: &VolumeTexture,
) -> Arc<wgpu::BindGroup> {
    Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("volume bind group"),
        layout: &program.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(texture.view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(texture.sampler()),
            },
        ],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_uniforms_size() {
        let size = std::mem::size_of::<CloudUniforms>();
        assert_eq!(size % 16, 0, "CloudUniforms size ({size} bytes) must be 16-byte aligned");
        // model(64) + mvp(64) + camera(16) + half_dim(16) + base(16)
        // + threshold/range/opacity/steps(16) + frame/slice_size/pads(16) = 208
        assert_eq!(size, 208, "CloudUniforms should be 208 bytes, got {size}");
    }

    #[test]
    fn test_isosurface_uniforms_size() {
        let size = std::mem::size_of::<IsosurfaceUniforms>();
        assert_eq!(size % 16, 0, "IsosurfaceUniforms size ({size} bytes) must be 16-byte aligned");
        // model(64) + mvp(64) + camera(16) + half_dim(16) + threshold/steps/slice_size/pad(16) = 176
        assert_eq!(size, 176, "IsosurfaceUniforms should be 176 bytes, got {size}");
    }

    #[test]
    fn test_default_parameters_match_viewmodels() {
        let cloud = CloudUniforms::default();
        assert!((cloud.steps - 100.0).abs() < f32::EPSILON);
        assert!((cloud.opacity - 0.25).abs() < f32::EPSILON);
        assert!((cloud.range - 0.1).abs() < f32::EPSILON);
        assert!((cloud.threshold - 0.25).abs() < f32::EPSILON);

        let iso = IsosurfaceUniforms::default();
        assert!((iso.steps - 200.0).abs() < f32::EPSILON);
        assert!((iso.threshold - 0.6).abs() < f32::EPSILON);
    }
}
