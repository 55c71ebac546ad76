//! Rendering backend for cumulo.
//!
//! Owns everything that touches the GPU: the [`Context`] capability surface,
//! the [`VolumeTexture`] resource wrapper, the shader program cache, draw
//! commands with per-frame uniform providers, and the [`RenderEngine`] that
//! drives the frame loop (windowed or headless). The WGSL ray-march programs
//! live under `src/shaders/` and mirror the CPU reference in `cumulo-core`.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod camera;
pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod frame;
pub mod screenshot;
pub mod shader;
pub mod texture;
pub mod volume_render;

pub use camera::Camera;
pub use command::{
    DrawCommand, FrameUniforms, Pass, RenderStateDesc, UniformMap, UniformPacker, UniformValue,
};
pub use context::{Context, VolumeCaps};
pub use engine::RenderEngine;
pub use error::{RenderError, RenderResult};
pub use frame::{FrameState, Primitive};
pub use screenshot::{save_image, ScreenshotError};
pub use shader::{ShaderCache, ShaderProgram, ShaderProgramDescriptor};
pub use texture::{
    validate_descriptor, validate_dimension, PixelDatatype, SamplerOptions, Texel, VolumeTexture,
    VolumeTextureDescriptor,
};
pub use volume_render::{create_volume_bind_group, CloudUniforms, IsosurfaceUniforms};

/// WGSL source of the cloud (alpha compositing) program.
pub const VOLUME_CLOUD_SHADER: &str = include_str!("shaders/volume_cloud.wgsl");

/// WGSL source of the iso-surface (first hit) program.
pub const VOLUME_ISOSURFACE_SHADER: &str = include_str!("shaders/volume_isosurface.wgsl");
