//! Draw commands and per-frame uniform providers.
//!
//! A [`DrawCommand`] is built once per renderable and appended to the frame's
//! command list every frame. Animated parameters flow through the
//! [`UniformMap`]: named zero-argument callbacks the engine evaluates fresh
//! each frame and packs into the command's uniform buffer, so nothing is
//! rebuilt per frame.

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::shader::ShaderProgram;

/// Render pass classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pass {
    /// Opaque geometry; no blending, depth-tested.
    #[default]
    Opaque,
}

/// Fixed-function state a command is drawn with.
///
/// Culling stays disabled for volume commands: the march must run even when
/// only back faces of the bounding box are visible (camera inside the box).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStateDesc {
    /// Depth test enabled.
    pub depth_test: bool,
    /// Back-face culling enabled.
    pub cull: bool,
}

impl Default for RenderStateDesc {
    fn default() -> Self {
        Self {
            depth_test: true,
            cull: false,
        }
    }
}

/// A value produced by a uniform provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Scalar float.
    F32(f32),
    /// Unsigned integer.
    U32(u32),
    /// Three-component vector.
    Vec3(Vec3),
}

impl UniformValue {
    /// Returns the scalar value, if this is one.
    #[must_use]
    pub fn as_f32(self) -> Option<f32> {
        match self {
            UniformValue::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the vector value, if this is one.
    #[must_use]
    pub fn as_vec3(self) -> Option<Vec3> {
        match self {
            UniformValue::Vec3(v) => Some(v),
            _ => None,
        }
    }
}

/// A named per-frame uniform callback.
pub type UniformProvider = Box<dyn Fn() -> UniformValue + Send + Sync>;

/// Name-keyed uniform providers, evaluated fresh every frame.
#[derive(Default)]
pub struct UniformMap {
    entries: Vec<(&'static str, UniformProvider)>,
}

impl UniformMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under `name`, replacing any previous entry.
    pub fn insert(
        &mut self,
        name: &'static str,
        provider: impl Fn() -> UniformValue + Send + Sync + 'static,
    ) {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, Box::new(provider)));
    }

    /// Evaluates the provider registered under `name`.
    #[must_use]
    pub fn evaluate(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| f())
    }

    /// Evaluates a scalar provider, falling back to `default`.
    #[must_use]
    pub fn f32_or(&self, name: &str, default: f32) -> f32 {
        self.evaluate(name).and_then(UniformValue::as_f32).unwrap_or(default)
    }

    /// Evaluates a vector provider, falling back to `default`.
    #[must_use]
    pub fn vec3_or(&self, name: &str, default: Vec3) -> Vec3 {
        self.evaluate(name).and_then(UniformValue::as_vec3).unwrap_or(default)
    }

    /// Returns the registered names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for UniformMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(n, _)| n))
            .finish()
    }
}

/// Camera state the engine hands to every command's uniform packer.
#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub proj: Mat4,
    /// Camera position in world space.
    pub camera_position: Vec3,
}

impl FrameUniforms {
    /// Model-view-projection matrix for a command's model transform.
    #[must_use]
    pub fn mvp(&self, model: Mat4) -> Mat4 {
        self.proj * self.view * model
    }

    /// Camera position transformed into a command's object space; the ray
    /// origin the vertex stage starts from.
    #[must_use]
    pub fn camera_in_object_space(&self, model: Mat4) -> Vec3 {
        model.inverse().transform_point3(self.camera_position)
    }
}

/// Packs evaluated uniform values into the command's uniform block bytes.
pub type UniformPacker = Arc<dyn Fn(&FrameUniforms, &DrawCommand) -> Vec<u8> + Send + Sync>;

/// One cached draw unit: geometry, program, render state, and the uniform
/// providers feeding it. Shared handles make per-frame submission a cheap
/// `Arc` clone.
pub struct DrawCommand {
    /// Bounding sphere center in world space.
    pub bounding_center: Vec3,
    /// Bounding sphere radius.
    pub bounding_radius: f32,
    /// Model transform.
    pub model: Mat4,
    /// Pass classification.
    pub pass: Pass,
    /// Fixed-function state baked into the pipeline.
    pub render_state: RenderStateDesc,
    /// The compiled shader program.
    pub program: Arc<ShaderProgram>,
    /// Vertex buffer (position-only box vertices).
    pub vertex_buffer: Arc<wgpu::Buffer>,
    /// Index buffer (u32 indices).
    pub index_buffer: Arc<wgpu::Buffer>,
    /// Number of indices to draw.
    pub index_count: u32,
    /// The uniform block backing this command.
    pub uniform_buffer: Arc<wgpu::Buffer>,
    /// Bind group referencing the uniform buffer, texture, and sampler.
    pub bind_group: Arc<wgpu::BindGroup>,
    /// Per-frame uniform providers.
    pub uniform_map: UniformMap,
    /// Maps evaluated providers + camera state into the uniform block.
    pub packer: UniformPacker,
}

impl DrawCommand {
    /// Evaluates the uniform map and writes the packed block to the GPU.
    pub fn write_uniforms(&self, queue: &wgpu::Queue, frame: &FrameUniforms) {
        let data = (self.packer)(frame, self);
        queue.write_buffer(&self.uniform_buffer, 0, &data);
    }
}

impl std::fmt::Debug for DrawCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawCommand")
            .field("pass", &self.pass)
            .field("render_state", &self.render_state)
            .field("index_count", &self.index_count)
            .field("uniforms", &self.uniform_map)
            .finish_non_exhaustive()
    }
}
