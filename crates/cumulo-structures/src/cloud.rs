//! The ray-marched volume cloud primitive.
//!
//! Owns a bounding box, a scalar field, and the lazily built GPU resources:
//! the volume texture and the draw command are created on the first frame
//! that can build them and cached for the primitive's lifetime. Per-frame
//! animation (the jitter frame counter, threshold tweaks) flows through the
//! uniform providers, never through a rebuild.

use std::any::Any;
use std::sync::{Arc, RwLock};

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use cumulo_core::raymarch::CloudParams;
use cumulo_core::ScalarField;
use cumulo_render::{
    create_volume_bind_group, CloudUniforms, Context, DrawCommand, FrameState, Pass, Primitive,
    RenderStateDesc, SamplerOptions, ShaderCache, ShaderProgramDescriptor, UniformMap,
    UniformPacker, UniformValue, VolumeTexture, VolumeTextureDescriptor,
};

use crate::box_geometry::BoxGeometry;

/// Default base color of the cloud (#798aa0).
const BASE_COLOR: Vec3 = Vec3::new(0.474, 0.541, 0.627);

/// Lifecycle of the lazily built GPU resources.
enum ResourceState {
    /// Nothing built yet; retried every frame.
    Uninitialized,
    /// Texture and command built and cached.
    Ready {
        texture: VolumeTexture,
        command: Arc<DrawCommand>,
        sampler_generation: u64,
    },
    /// Construction failed; terminal for this primitive.
    Failed,
    /// Explicitly destroyed; terminal.
    Destroyed,
}

fn read_params(params: &Arc<RwLock<CloudParams>>) -> CloudParams {
    *params.read().expect("params lock poisoned")
}

fn build_uniform_map(
    params: &Arc<RwLock<CloudParams>>,
    base: Vec3,
    half_dim: Vec3,
    slice_size: f32,
) -> UniformMap {
    let mut map = UniformMap::new();
    map.insert("base", move || UniformValue::Vec3(base));
    map.insert("halfdim", move || UniformValue::Vec3(half_dim));
    map.insert("slice_size", move || UniformValue::F32(slice_size));

    let p = Arc::clone(params);
    map.insert("threshold", move || UniformValue::F32(read_params(&p).threshold));
    let p = Arc::clone(params);
    map.insert("range", move || UniformValue::F32(read_params(&p).range));
    let p = Arc::clone(params);
    map.insert("opacity", move || UniformValue::F32(read_params(&p).opacity));
    let p = Arc::clone(params);
    map.insert("steps", move || UniformValue::F32(read_params(&p).steps));
    let p = Arc::clone(params);
    map.insert("frame", move || UniformValue::F32(read_params(&p).frame));
    map
}

fn cloud_packer() -> UniformPacker {
    Arc::new(|frame, command| {
        let defaults = CloudParams::default();
        let mut uniforms = CloudUniforms::default();

        uniforms.model = command.model.to_cols_array_2d();
        uniforms.mvp = frame.mvp(command.model).to_cols_array_2d();
        let camera = frame.camera_in_object_space(command.model);
        uniforms.camera_object = [camera.x, camera.y, camera.z, 0.0];

        let half_dim = command.uniform_map.vec3_or("halfdim", Vec3::splat(0.5));
        uniforms.half_dim = [half_dim.x, half_dim.y, half_dim.z, 0.0];
        let base = command.uniform_map.vec3_or("base", BASE_COLOR);
        uniforms.base = [base.x, base.y, base.z, 0.0];

        uniforms.threshold = command.uniform_map.f32_or("threshold", defaults.threshold);
        uniforms.range = command.uniform_map.f32_or("range", defaults.range);
        uniforms.opacity = command.uniform_map.f32_or("opacity", defaults.opacity);
        uniforms.steps = command.uniform_map.f32_or("steps", defaults.steps);
        uniforms.frame = command.uniform_map.f32_or("frame", defaults.frame);
        uniforms.slice_size = command.uniform_map.f32_or("slice_size", uniforms.slice_size);

        bytemuck::bytes_of(&uniforms).to_vec()
    })
}

/// A volumetric cloud rendered by per-fragment ray marching.
pub struct VolumeCloud {
    name: String,
    transform: Mat4,
    geometry: Option<BoxGeometry>,
    half_dim: Vec3,
    field: Arc<ScalarField>,
    params: Arc<RwLock<CloudParams>>,
    base_color: Vec3,
    sampler_options: SamplerOptions,
    resources: ResourceState,
}

impl VolumeCloud {
    /// Creates a cloud primitive from a transform, bounding geometry, and a
    /// scalar field.
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
            params: Arc::new(RwLock::new(CloudParams::default())),
            base_color: BASE_COLOR,
            sampler_options: SamplerOptions::default(),
            resources: ResourceState::Uninitialized,
        }
    }

    /// Shared handle to the tunable render parameters.
    #[must_use]
    pub fn params(&self) -> Arc<RwLock<CloudParams>> {
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

    /// Replaces the texture sampler. Applied immediately when the texture
    /// exists (the bind group is rebuilt on the next frame), recorded for
    /// the initial build otherwise.
    pub fn set_sampler(&mut self, context: &Context, options: SamplerOptions) {
        self.sampler_options = options;
        if let ResourceState::Ready { texture, .. } = &mut self.resources {
            texture.set_sampler(context, options);
        }
    }

    /// Builds or repairs the cached GPU resources.
    fn ensure_ready(&mut self, context: &Context, shaders: &mut ShaderCache) {
        if let ResourceState::Ready {
            texture,
            command,
            sampler_generation,
        } = &mut self.resources
        {
            // The command is immutable once built; a sampler swap or a
            // transform change produces a fresh command over the same
            // buffers and program.
            if texture.sampler_generation() != *sampler_generation
                || command.model != self.transform
            {
                let bind_group = create_volume_bind_group(
                    &context.device,
                    &command.program,
                    &command.uniform_buffer,
                    texture,
                );
                let center = self.transform.w_axis.truncate();
                *command = Arc::new(DrawCommand {
                    bounding_center: center,
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
                        self.base_color,
                        self.half_dim,
                        self.field.size() as f32,
                    ),
                    packer: cloud_packer(),
                });
                *sampler_generation = texture.sampler_generation();
            }
            return;
        }
        if !matches!(self.resources, ResourceState::Uninitialized) {
            return;
        }

        // Absent or degenerate geometry is a silent skip, retried next frame.
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
                log::error!("volume cloud '{}': texture construction failed: {e}", self.name);
                self.resources = ResourceState::Failed;
                return;
            }
        };

        let program = shaders.get_or_create(
            context,
            &ShaderProgramDescriptor {
                label: "volume cloud",
                source: cumulo_render::VOLUME_CLOUD_SHADER,
                ..Default::default()
            },
        );

        let vertex_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("volume cloud vertices"),
                contents: bytemuck::cast_slice(&mesh.positions),
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
        let index_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("volume cloud indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            },
        ));
        let uniform_buffer = Arc::new(context.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("volume cloud uniforms"),
                contents: bytemuck::bytes_of(&CloudUniforms::default()),
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
            uniform_map: build_uniform_map(
                &self.params,
                self.base_color,
                self.half_dim,
                self.field.size() as f32,
            ),
            packer: cloud_packer(),
        });

        log::debug!("volume cloud '{}': built {size}^3 texture and draw command", self.name);
        self.resources = ResourceState::Ready {
            texture,
            command,
            sampler_generation,
        };
    }
}

impl Primitive for VolumeCloud {
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
        "VolumeCloud"
    }

    fn update(&mut self, frame: &mut FrameState<'_>) {
        if self.is_destroyed() {
            return;
        }
        {
            // Advance the temporal dither.
            let mut params = self.params.write().expect("params lock poisoned");
            params.frame = frame.frame_number as f32;
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

    fn test_cloud() -> VolumeCloud {
        let field = ScalarField::cloud_with(4, 0.05, |_, _, _| 0.0).unwrap();
        VolumeCloud::new(
            "test cloud",
            Mat4::IDENTITY,
            BoxGeometry::new(Vec3::ONE),
            field,
        )
    }

    #[test]
    fn test_construction() {
        let cloud = test_cloud();
        assert_eq!(cloud.name(), "test cloud");
        assert_eq!(cloud.kind(), "VolumeCloud");
        assert_eq!(cloud.half_dim(), Vec3::splat(0.5));
        assert!(!cloud.is_destroyed());
        assert!(cloud.texture().is_none(), "texture must be lazy");
    }

    #[test]
    fn test_destroy_flags_primitive() {
        let mut cloud = test_cloud();
        cloud.destroy();
        assert!(cloud.is_destroyed());
        // Idempotent.
        cloud.destroy();
        assert!(cloud.is_destroyed());
    }

    #[test]
    fn test_refresh_does_not_resurrect_destroyed() {
        let mut cloud = test_cloud();
        cloud.destroy();
        cloud.refresh();
        assert!(cloud.is_destroyed());
    }

    #[test]
    fn test_bounding_box_identity_transform() {
        let cloud = test_cloud();
        let (min, max) = cloud.bounding_box().unwrap();
        assert!((min - Vec3::splat(-0.5)).length() < 1e-6);
        assert!((max - Vec3::splat(0.5)).length() < 1e-6);
    }

    #[test]
    fn test_bounding_box_translated() {
        let mut cloud = test_cloud();
        cloud.set_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let (min, max) = cloud.bounding_box().unwrap();
        assert!((min.x - 9.5).abs() < 1e-5);
        assert!((max.x - 10.5).abs() < 1e-5);
    }

    #[test]
    fn test_uniform_providers_track_params() {
        let cloud = test_cloud();
        let map = build_uniform_map(&cloud.params, BASE_COLOR, cloud.half_dim(), 4.0);

        assert!((map.f32_or("threshold", 0.0) - 0.25).abs() < 1e-6);
        cloud.params.write().unwrap().threshold = 0.5;
        assert!(
            (map.f32_or("threshold", 0.0) - 0.5).abs() < 1e-6,
            "providers must observe parameter changes without a rebuild"
        );

        cloud.params.write().unwrap().frame = 7.0;
        assert!((map.f32_or("frame", 0.0) - 7.0).abs() < 1e-6);
        assert_eq!(map.vec3_or("halfdim", Vec3::ZERO), Vec3::splat(0.5));
        assert!((map.f32_or("slice_size", 0.0) - 4.0).abs() < 1e-6);
    }
}
