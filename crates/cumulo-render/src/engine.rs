//! The render engine driving the per-frame loop.
//!
//! The engine owns the context, the depth target, the camera, and the shader
//! cache. Each frame it invokes `update` on every live primitive to gather
//! the command list, evaluates each command's uniform providers, and executes
//! the list in a single render pass.

use std::sync::Arc;

use glam::Vec3;

use crate::camera::Camera;
use crate::command::{DrawCommand, FrameUniforms};
use crate::context::Context;
use crate::error::{RenderError, RenderResult};
use crate::frame::{FrameState, Primitive};
use crate::shader::ShaderCache;

/// The render engine backed by wgpu.
pub struct RenderEngine {
    /// The graphics context.
    pub context: Context,
    /// The render surface (None for headless).
    surface: Option<wgpu::Surface<'static>>,
    /// Surface configuration.
    surface_config: wgpu::SurfaceConfiguration,
    /// Depth texture.
    pub depth_texture: wgpu::Texture,
    /// Depth texture view.
    pub depth_view: wgpu::TextureView,
    /// Main camera.
    pub camera: Camera,
    /// Shader program cache.
    shaders: ShaderCache,
    /// Current viewport width.
    width: u32,
    /// Current viewport height.
    height: u32,
    /// Monotonic frame counter.
    frame_number: u64,
    /// Capture target texture (lazily created for headless rendering).
    capture_texture: Option<wgpu::Texture>,
    /// Capture staging buffer.
    capture_buffer: Option<wgpu::Buffer>,
}

impl RenderEngine {
    /// Creates a windowed render engine.
    ///
    /// # Errors
    /// Fails when no adapter/device is available or surface creation fails.
    pub async fn new_windowed(
        window: Arc<winit::window::Window>,
        vsync: bool,
    ) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("cumulo device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // The ray-march shaders write sRGB-encoded color themselves, so a
        // non-sRGB surface format avoids a double gamma conversion.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let context = Context::new(instance, adapter, device, queue, surface_format);
        let (depth_texture, depth_view) =
            Self::create_depth_texture(&context.device, context.depth_format(), width, height);

        #[allow(clippy::cast_precision_loss)]
        let camera = Camera::new(width as f32 / height as f32);

        Ok(Self {
            context,
            surface: Some(surface),
            surface_config,
            depth_texture,
            depth_view,
            camera,
            shaders: ShaderCache::new(),
            width,
            height,
            frame_number: 0,
            capture_texture: None,
            capture_buffer: None,
        })
    }

    /// Creates a headless render engine.
    ///
    /// # Errors
    /// Fails when no adapter/device is available.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let context = Context::headless().await?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: context.target_format(),
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let (depth_texture, depth_view) =
            Self::create_depth_texture(&context.device, context.depth_format(), width, height);

        #[allow(clippy::cast_precision_loss)]
        let camera = Camera::new(width as f32 / height as f32);

        Ok(Self {
            context,
            surface: None,
            surface_config,
            depth_texture,
            depth_view,
            camera,
            shaders: ShaderCache::new(),
            width,
            height,
            frame_number: 0,
            capture_texture: None,
            capture_buffer: None,
        })
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Resizes the render targets.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.width = width;
        self.height = height;
        self.surface_config.width = width;
        self.surface_config.height = height;

        if let Some(surface) = &self.surface {
            surface.configure(&self.context.device, &self.surface_config);
        }

        let (depth_texture, depth_view) = Self::create_depth_texture(
            &self.context.device,
            self.context.depth_format(),
            width,
            height,
        );
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;

        #[allow(clippy::cast_precision_loss)]
        self.camera.set_aspect_ratio(width as f32 / height as f32);

        self.capture_texture = None;
        self.capture_buffer = None;
    }

    /// Current viewport size.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of frames rendered so far.
    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Invokes `update` on every live primitive, gathering the frame's
    /// command list.
    fn gather_commands<'a, I>(&mut self, primitives: I) -> Vec<Arc<DrawCommand>>
    where
        I: IntoIterator<Item = &'a mut Box<dyn Primitive>>,
    {
        let mut list = Vec::new();
        let mut frame = FrameState {
            context: &self.context,
            shaders: &mut self.shaders,
            command_list: &mut list,
            frame_number: self.frame_number,
        };
        for primitive in primitives {
            if primitive.is_destroyed() {
                continue;
            }
            primitive.update(&mut frame);
        }
        list
    }

    fn frame_uniforms(&self) -> FrameUniforms {
        FrameUniforms {
            view: self.camera.view_matrix(),
            proj: self.camera.projection_matrix(),
            camera_position: self.camera.position,
        }
    }

    /// Executes the command list into the given color target.
    fn execute(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        commands: &[Arc<DrawCommand>],
        background: Vec3,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("volume render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(background.x),
                        g: f64::from(background.y),
                        b: f64::from(background.z),
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        for command in commands {
            render_pass.set_pipeline(&command.program.pipeline);
            render_pass.set_bind_group(0, command.bind_group.as_ref(), &[]);
            render_pass.set_vertex_buffer(0, command.vertex_buffer.slice(..));
            render_pass.set_index_buffer(command.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..command.index_count, 0, 0..1);
        }
    }

    /// Renders one frame to the window surface.
    ///
    /// # Errors
    /// Surface acquisition failures (lost/outdated/out-of-memory) propagate;
    /// the caller decides whether to reconfigure or bail.
    pub fn render_frame<'a, I>(&mut self, primitives: I, background: Vec3) -> RenderResult<()>
    where
        I: IntoIterator<Item = &'a mut Box<dyn Primitive>>,
    {
        let surface = self.surface.as_ref().ok_or(RenderError::SurfaceLost)?;
        let frame_texture = surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost => RenderError::SurfaceLost,
            wgpu::SurfaceError::Outdated => RenderError::SurfaceOutdated,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
            wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => RenderError::Timeout,
        })?;
        let target = frame_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let commands = self.gather_commands(primitives);
        let frame_uniforms = self.frame_uniforms();
        for command in &commands {
            command.write_uniforms(&self.context.queue, &frame_uniforms);
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.execute(&mut encoder, &target, &commands, background);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame_texture.present();

        self.frame_number += 1;
        Ok(())
    }

    /// Bytes per row of the capture buffer, padded to the copy alignment.
    fn aligned_bytes_per_row(width: u32) -> u32 {
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unpadded.div_ceil(align) * align
    }

    /// Renders one frame into the capture target (headless path).
    ///
    /// # Errors
    /// Propagates device errors from resource creation.
    pub fn render_to_capture<'a, I>(&mut self, primitives: I, background: Vec3) -> RenderResult<()>
    where
        I: IntoIterator<Item = &'a mut Box<dyn Primitive>>,
    {
        let bytes_per_row = Self::aligned_bytes_per_row(self.width);
        let buffer_size = u64::from(bytes_per_row) * u64::from(self.height);

        let capture_texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture texture"),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.context.target_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let capture_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let target = capture_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let commands = self.gather_commands(primitives);
        let frame_uniforms = self.frame_uniforms();
        for command in &commands {
            command.write_uniforms(&self.context.queue, &frame_uniforms);
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture encoder"),
            });
        self.execute(&mut encoder, &target, &commands, background);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        self.capture_texture = Some(capture_texture);
        self.capture_buffer = Some(capture_buffer);
        self.frame_number += 1;
        Ok(())
    }

    /// Reads the captured frame back as tightly packed RGBA bytes.
    ///
    /// Must be called after [`RenderEngine::render_to_capture`].
    ///
    /// # Errors
    /// Fails when no capture is pending or buffer mapping fails.
    pub fn capture_frame(&mut self) -> RenderResult<Vec<u8>> {
        let texture = self
            .capture_texture
            .as_ref()
            .ok_or_else(|| RenderError::CaptureFailed("no pending capture".into()))?;
        let buffer = self
            .capture_buffer
            .as_ref()
            .ok_or_else(|| RenderError::CaptureFailed("no pending capture".into()))?;

        let bytes_per_row = Self::aligned_bytes_per_row(self.width);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture copy encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.context.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::CaptureFailed("map callback dropped".into()))?
            .map_err(|e| RenderError::CaptureFailed(format!("buffer map failed: {e:?}")))?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.width * 4) as usize;
        let mut result = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height {
            let start = (row * bytes_per_row) as usize;
            result.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        buffer.unmap();

        self.capture_texture = None;
        self.capture_buffer = None;

        Ok(result)
    }
}
