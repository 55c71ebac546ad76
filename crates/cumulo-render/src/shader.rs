//! Shader program compilation and caching.
//!
//! Programs are content-addressed: the cache key hashes the WGSL source, the
//! entry points, and the target format, so each (vertex, fragment, layout)
//! pair compiles exactly once per device. Renderables fetch from the cache
//! during their one-time command build.

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::command::RenderStateDesc;
use crate::context::Context;

/// A compiled volume shader program.
pub struct ShaderProgram {
    /// The render pipeline.
    pub pipeline: wgpu::RenderPipeline,
    /// Bind group layout (uniform block, 3D texture, sampler).
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Source + state description of a program, the cache key inputs.
#[derive(Debug, Clone)]
pub struct ShaderProgramDescriptor<'a> {
    /// Debug label.
    pub label: &'a str,
    /// WGSL module containing both entry points.
    pub source: &'a str,
    /// Vertex entry point.
    pub vertex_entry: &'a str,
    /// Fragment entry point.
    pub fragment_entry: &'a str,
    /// Fixed-function state to bake into the pipeline.
    pub render_state: RenderStateDesc,
}

impl Default for ShaderProgramDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: "volume program",
            source: "",
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            render_state: RenderStateDesc::default(),
        }
    }
}

/// Bind group layout shared by the volume programs.
fn create_volume_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("volume bind group layout"),
        entries: &[
            // Uniform block
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Volume texture
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            },
            // Filtering sampler
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Compiles a program against the context's target and depth formats.
fn create_program(context: &Context, desc: &ShaderProgramDescriptor<'_>) -> ShaderProgram {
    let device = &context.device;

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });

    let bind_group_layout = create_volume_bind_group_layout(device);

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(desc.label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let cull_mode = if desc.render_state.cull {
        Some(wgpu::Face::Back)
    } else {
        None
    };

    let depth_stencil = desc.render_state.depth_test.then(|| wgpu::DepthStencilState {
        format: context.depth_format(),
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some(desc.vertex_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                }],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(desc.fragment_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: context.target_format(),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    ShaderProgram {
        pipeline,
        bind_group_layout,
    }
}

/// Content-addressed shader program cache, owned by the engine.
#[derive(Default)]
pub struct ShaderCache {
    programs: HashMap<u64, Arc<ShaderProgram>>,
}

impl ShaderCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache key for a descriptor against the context's formats.
    #[must_use]
    pub fn key(context: &Context, desc: &ShaderProgramDescriptor<'_>) -> u64 {
        let mut hasher = DefaultHasher::new();
        desc.source.hash(&mut hasher);
        desc.vertex_entry.hash(&mut hasher);
        desc.fragment_entry.hash(&mut hasher);
        desc.render_state.depth_test.hash(&mut hasher);
        desc.render_state.cull.hash(&mut hasher);
        context.target_format().hash(&mut hasher);
        context.depth_format().hash(&mut hasher);
        hasher.finish()
    }

    /// Returns the cached program for the descriptor, compiling it on first
    /// use.
    pub fn get_or_create(
        &mut self,
        context: &Context,
        desc: &ShaderProgramDescriptor<'_>,
    ) -> Arc<ShaderProgram> {
        let key = Self::key(context, desc);
        match self.programs.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                log::debug!("compiling shader program '{}'", desc.label);
                let program = Arc::new(create_program(context, desc));
                entry.insert(Arc::clone(&program));
                program
            }
        }
    }

    /// Number of compiled programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
