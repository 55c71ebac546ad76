//! The ray-marched noise iso-surface primitive.
//!
//! Same resource lifecycle as the cloud: a lazily built volume texture and
//! draw command, cached for the primitive's lifetime. The fragment program
//! stops at the first density sample above the threshold instead of
//! compositing.

use std::any::Any;
use std::sync::{Arc, RwLock};

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use cumulo_core::raymarch::IsosurfaceParams;
use cumulo_core::ScalarField;
use cumulo_render::{
    create_volume_bind_group, Context, DrawCommand, FrameState, IsosurfaceUniforms, Pass,
    Primitive, RenderStateDesc, SamplerOptions, ShaderCache, ShaderProgramDescriptor, UniformMap,
    UniformPacker, UniformValue, VolumeTexture, VolumeTextureDescriptor,
};

use crate::box_geometry::BoxGeometry;

enum ResourceState {
    Uninitialized,
    Ready {
        texture: VolumeTexture,
        command: Arc<DrawCommand>,
        sampler_generation: u64,
    },
    Failed,
    Destroyed,
}

fn read_params(params: &Arc<RwLock<IsosurfaceParams>>) -> IsosurfaceParams {
    *params.read().expect("params lock poisoned")
}

fn build_uniform_map(
    params: &Arc<RwLock<IsosurfaceParams>>,
    half_dim: Vec3,
    slice_size: f32,
) -> UniformMap {
    let mut map = UniformMap::new();
    map.insert("halfdim", move || UniformValue::Vec3(half_dim));
    map.insert("slice_size", move || UniformValue::F32(slice_size));

    let p = Arc::clone(params);
    map.insert("threshold", move || UniformValue::F32(read_params(&p).threshold));
    let p = Arc::clone(params);
    map.insert("steps", move || UniformValue::F32(read_params(&p).steps));
    map
}

fn isosurface_packer() -> UniformPacker {
    Arc::new(|frame, command| {
        let defaults = IsosurfaceParams::default();
        let mut uniforms = IsosurfaceUniforms::default();

        uniforms.model = command.model.to_cols_array_2d();
        uniforms.mvp = frame.mvp(command.model).to_cols_array_2d();
        let camera = frame.camera_in_object_space(command.model);
        uniforms.camera_object = [camera.x, camera.y, camera.z, 0.0];

        let half_dim = command.uniform_map.vec3_or("halfdim", Vec3::splat(0.5));
        uniforms.half_dim = [half_dim.x, half_dim.y, half_dim.z, 0.0];

        uniforms.threshold = command.uniform_map.f32_or("threshold", defaults.threshold);
        uniforms.steps = command.uniform_map.f32_or("steps", defaults.steps);
        uniforms.slice_size = command.uniform_map.f32_or("slice_size", uniforms.slice_size);

        bytemuck::bytes_of(&uniforms).to_vec()
    })
}

/// An iso-surfaced noise solid rendered by per-fragment ray marching.
pub struct NoiseIsosurface {
    name: String,
    transform: Mat4,
    geometry: Option<BoxGeometry>,
    half_dim: Vec3,
    field: Arc<ScalarField>,
    params: Arc<RwLock<IsosurfaceParams>>,
    sampler_options: SamplerOptions,
    resources: ResourceState,
}

impl NoiseIsosurface {
    /// Creates an iso-surface primitive from a transform, bounding geometry,
    /// and a scalar field.
    pub fn new(
        name: impl Into<String>,
        transform: Mat4,
        geometry: BoxGeometry,
        field: ScalarField,
    ) -> Self {
        let half_dim = geometry.half_dim();
        Self {
            name: name.into(),
            transform,
            geometry: Some(geometry),
            half_dim,
            field: Arc::new(field),
            params: Arc::new(RwLock::new(IsosurfaceParams::default())),
            sampler_options: SamplerOptions::default(),
            resources: ResourceState::Uninitialized,
        }
    }

    /// Shared handle to the tunable render parameters.
    #[must_use]
    pub fn params(&self) -> Arc<RwLock<IsosurfaceParams>> {
        Arc::clone(&self.params)
    }

    /// The scalar field backing the volume texture.
    #[must_use]
    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// Half extents of the bounding box.
    #[must_use]
    pub fn half_dim(&self) -> Vec3 {
        self.half_dim
    }

    /// The model transform.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Sets the model transform; the cached command picks it up on the next
    /// frame.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// The owned volume texture, once built.
    #[must_use]
    pub fn texture(&self) -> Option<&VolumeTexture> {
        match &self.resources {
            ResourceState::Ready { texture, .. } => Some(texture),
            _ => None,
        }
    }

    /// Replaces the texture sampler; see [`VolumeCloud::set_sampler`].
    ///
    /// [`VolumeCloud::set_sampler`]: crate::cloud::VolumeCloud::set_sampler
    pub fn set_sampler(&mut self, context: &Context, options: SamplerOptions) {
        self.sampler_options = options;
        if let ResourceState::Ready { texture, .. } = &mut self.resources {
            texture.set_sampler(context, options);
        }
    }

    fn ensure_ready(&mut self, context: &Context, shaders: &mut ShaderCache) {
        if let ResourceState::Ready {
            texture,
            command,
            sampler_generation,
        } = &mut self.resources
        {
            if texture.sampler_generation() != *sampler_generation
                || command.model != self.transform
            {
                let bind_group = create_volume_bind_group(
                    &context.device,
                    &command.program,
                    &command.uniform_buffer,
                    texture,
                );
                *command = Arc::new(DrawCommand {
                    bounding_center: self.transform.w_axis.truncate(),
                    bounding_radius: command.bounding_radius,
                    model: self.transform,
                    pass: command.pass,
                    render_state: command.render_state,
                    program: Arc::clone(&command.program),
                    vertex_buffer: Arc::clone(&command.vertex_buffer),
                    index_buffer: Arc::clone(&command.index_buffer),
                    index_count: command.index_count,
                    uniform_buffer: Arc::clone(&command.uniform_buffer),
                    bind_group,
                    uniform_map: build_uniform_map(
                        &self.params,
                        self.half_dim,
                        self.field.size() as f32,
                    ),
                    packer: isosurface_packer(),
                });
                *sampler_generation = texture.sampler_generation();
            }
            return;
        }
        if !matches!(self.resources, ResourceState::Uninitialized) {
            return;
        }

        let Some(geometry) = self.geometry else {
            return;
        };
        let Some(mesh) = geometry.tessellate() else {
            return;
        };

        let size = self.field.size();
        let texture = match VolumeTexture::new(
            context,
            &VolumeTextureDescriptor {
                width: size,
                height: size,
                depth: size,
                format: wgpu::TextureFormat::R8Unorm,
                flip_y: false,
            },
            self.field.as_bytes(),
            Some(self.sampler_options),
        ) {
            Ok(texture) => texture,
            Err(e) => {
                log::error!(
                    "noise isosurface '{}': texture construction failed: {e}",
                    self.name
                );
                self.resources = ResourceState::Failed;
                return;
            }
        };

        let program = shaders.get_or_create(
            context,
            &ShaderProgramDescriptor {
                label: "volume isosurface",
                source: cumulo_render::VOLUME_ISOSURFACE_SHADER,
                ..Default::default()
            },
        );

        let vertex_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("isosurface vertices"),
                contents: bytemuck::cast_slice(&mesh.positions),
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
        let index_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("isosurface indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        ));
        let uniform_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("isosurface uniforms"),
                contents: bytemuck::bytes_of(&IsosurfaceUniforms::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        ));

        let bind_group =
            create_volume_bind_group(&context.device, &program, &uniform_buffer, &texture);

        let sampler_generation = texture.sampler_generation();
        let command = Arc::new(DrawCommand {
            bounding_center: self.transform.w_axis.truncate(),
            bounding_radius: mesh.bounding_radius(),
            model: self.transform,
            pass: Pass::Opaque,
            render_state: RenderStateDesc::default(),
            program,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniform_buffer,
            bind_group,
            uniform_map: build_uniform_map(&self.params, self.half_dim, self.field.size() as f32),
            packer: isosurface_packer(),
        });

        log::debug!(
            "noise isosurface '{}': built {size}^3 texture and draw command",
            self.name
        );
        self.resources = ResourceState::Ready {
            texture,
            command,
            sampler_generation,
        };
    }
}

impl Primitive for NoiseIsosurface {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "NoiseIsosurface"
    }

    fn update(&mut self, frame: &mut FrameState<'_>) {
        if self.is_destroyed() {
            return;
        }
        self.ensure_ready(frame.context, frame.shaders);
        if let ResourceState::Ready { command, .. } = &self.resources {
            frame.command_list.push(Arc::clone(command));
        }
    }

    fn is_destroyed(&self) -> bool {
        matches!(self.resources, ResourceState::Destroyed)
    }

    fn destroy(&mut self) {
        if let ResourceState::Ready { texture, .. } = &mut self.resources {
            texture.destroy();
        }
        self.resources = ResourceState::Destroyed;
    }

    fn refresh(&mut self) {
        match &mut self.resources {
            ResourceState::Destroyed => {}
            ResourceState::Ready { texture, .. } => {
                texture.destroy();
                self.resources = ResourceState::Uninitialized;
            }
            _ => self.resources = ResourceState::Uninitialized,
        }
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let h = self.half_dim;
        let mut min = Vec3::MAX;
        let mut max = Vec3::MIN;
        for corner in [
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
        ] {
            let world = self.transform.transform_point3(corner);
            min = min.min(world);
            max = max.max(world);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_solid() -> NoiseIsosurface {
        let field = ScalarField::noise_solid_with(4, |_, _, _| 0.5).unwrap();
        NoiseIsosurface::new(
            "test solid",
            Mat4::IDENTITY,
            BoxGeometry::new(Vec3::ONE),
            field,
        )
    }

    #[test]
    fn test_construction() {
        let solid = test_solid();
        assert_eq!(solid.name(), "test solid");
        assert_eq!(solid.kind(), "NoiseIsosurface");
        assert_eq!(solid.half_dim(), Vec3::splat(0.5));
        assert!(!solid.is_destroyed());
        assert!(solid.texture().is_none());
    }

    #[test]
    fn test_destroy_lifecycle() {
        let mut solid = test_solid();
        solid.destroy();
        assert!(solid.is_destroyed());
        solid.refresh();
        assert!(solid.is_destroyed(), "refresh must not resurrect");
    }

    #[test]
    fn test_uniform_providers_track_params() {
        let solid = test_solid();
        let map = build_uniform_map(&solid.params, solid.half_dim(), 4.0);

        assert!((map.f32_or("threshold", 0.0) - 0.6).abs() < 1e-6);
        assert!((map.f32_or("steps", 0.0) - 200.0).abs() < 1e-6);

        solid.params.write().unwrap().threshold = 0.4;
        assert!((map.f32_or("threshold", 0.0) - 0.4).abs() < 1e-6);
    }
}
