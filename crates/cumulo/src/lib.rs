//! cumulo: a Rust-native volumetric ray-marching renderer.
//!
//! Cumulo renders dense 3D scalar fields by per-pixel ray marching: a
//! procedural cloud composited front-to-back, or an iso-surfaced noise
//! solid shaded at the first threshold crossing. You register primitives,
//! cumulo owns the GPU resources and the frame loop.
//!
//! # Quick Start
//!
//! ```no_run
//! use cumulo::*;
//!
//! fn main() -> Result<()> {
//!     // Initialize cumulo
//!     init()?;
//!
//!     // Register a 128^3 procedural cloud in a unit box
//!     register_volume_cloud("cloud", Vec3::ONE, 128, 0.05)?;
//!
//!     // Show the viewer
//!     show();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `cumulo-core` holds the scalar fields, the noise, and the CPU reference
//!   of the ray-march algorithms
//! - `cumulo-render` owns the GPU: context, volume textures, draw commands,
//!   shader cache, and the render engine
//! - `cumulo-structures` provides the renderable primitives registered here

mod app;
pub mod headless;
pub mod registry;
pub mod state;

use std::sync::{Arc, RwLock};

// Re-export core types
pub use cumulo_core::{
    error::{CumuloError, Result},
    options::Options,
    raymarch::{CloudParams, IsosurfaceParams},
    ScalarField,
};

// Re-export render types
pub use cumulo_render::{
    Camera, Context, FrameState, Primitive, RenderEngine, SamplerOptions, VolumeTexture,
};

// Re-export structures
pub use cumulo_structures::{BoxGeometry, NoiseIsosurface, VolumeCloud};

pub use headless::{render_to_file, render_to_image};
pub use registry::Registry;
pub use state::{with_state, with_state_mut, State};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};

/// Initializes cumulo with default settings.
///
/// This must be called before any other cumulo functions.
///
/// # Errors
/// Returns [`CumuloError::AlreadyInitialized`] when called twice.
pub fn init() -> Result<()> {
    state::init_state()?;
    log::info!("cumulo initialized");
    Ok(())
}

/// Returns whether cumulo has been initialized.
#[must_use]
pub fn is_initialized() -> bool {
    state::is_initialized()
}

/// Shuts down cumulo, destroying all registered primitives.
pub fn shutdown() {
    state::shutdown_state();
    log::info!("cumulo shut down");
}

/// Shows the cumulo viewer window.
///
/// This function blocks until the window is closed.
pub fn show() {
    let _ = env_logger::try_init();
    app::run_app();
}

/// Registers a procedural volume cloud.
///
/// Generates a `size^3` scalar field (noise under a soft spherical mask) and
/// a cloud primitive bounded by a box with the given full extents.
///
/// # Errors
/// Fails for `size == 0` or a duplicate name.
pub fn register_volume_cloud(
    name: impl Into<String>,
    dimensions: Vec3,
    size: u32,
    scale: f32,
) -> Result<VolumeCloudHandle> {
    let name = name.into();
    let field = ScalarField::cloud(size, scale)?;
    let cloud = VolumeCloud::new(
        name.clone(),
        Mat4::IDENTITY,
        BoxGeometry::new(dimensions),
        field,
    );
    let params = cloud.params();

    state::with_state_mut(|state| -> Result<()> {
        state.registry.register(Box::new(cloud))?;
        state.update_extents();
        Ok(())
    })?;

    Ok(VolumeCloudHandle { name, params })
}

/// Registers an iso-surfaced noise solid.
///
/// Generates a raw `size^3` noise field and an iso-surface primitive bounded
/// by a box with the given full extents.
///
/// # Errors
/// Fails for `size == 0` or a duplicate name.
pub fn register_noise_isosurface(
    name: impl Into<String>,
    dimensions: Vec3,
    size: u32,
) -> Result<NoiseIsosurfaceHandle> {
    let name = name.into();
    let field = ScalarField::noise_solid(size)?;
    let solid = NoiseIsosurface::new(
        name.clone(),
        Mat4::IDENTITY,
        BoxGeometry::new(dimensions),
        field,
    );
    let params = solid.params();

    state::with_state_mut(|state| -> Result<()> {
        state.registry.register(Box::new(solid))?;
        state.update_extents();
        Ok(())
    })?;

    Ok(NoiseIsosurfaceHandle { name, params })
}

/// Gets a registered volume cloud by name.
#[must_use]
pub fn get_volume_cloud(name: &str) -> Option<VolumeCloudHandle> {
    with_state(|state| {
        state
            .registry
            .get("VolumeCloud", name)
            .and_then(|p| p.as_any().downcast_ref::<VolumeCloud>())
            .map(|cloud| VolumeCloudHandle {
                name: name.to_string(),
                params: cloud.params(),
            })
    })
}

/// Gets a registered noise iso-surface by name.
#[must_use]
pub fn get_noise_isosurface(name: &str) -> Option<NoiseIsosurfaceHandle> {
    with_state(|state| {
        state
            .registry
            .get("NoiseIsosurface", name)
            .and_then(|p| p.as_any().downcast_ref::<NoiseIsosurface>())
            .map(|solid| NoiseIsosurfaceHandle {
                name: name.to_string(),
                params: solid.params(),
            })
    })
}

/// Destroys and removes a primitive by name.
pub fn remove_primitive(name: &str) {
    with_state_mut(|state| {
        for kind in ["VolumeCloud", "NoiseIsosurface"] {
            if let Some(mut primitive) = state.registry.remove(kind, name) {
                primitive.destroy();
            }
        }
        state.update_extents();
    });
}

/// Destroys and removes all primitives.
pub fn remove_all_primitives() {
    with_state_mut(|state| {
        for primitive in state.registry.iter_mut() {
            primitive.destroy();
        }
        state.registry.clear();
        state.update_extents();
    });
}

/// Handle for a registered volume cloud.
#[derive(Clone)]
pub struct VolumeCloudHandle {
    name: String,
    params: Arc<RwLock<CloudParams>>,
}

impl VolumeCloudHandle {
    /// Returns the name of this cloud.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_params(&self) -> std::sync::RwLockWriteGuard<'_, CloudParams> {
        self.params.write().expect("params lock poisoned")
    }

    /// Current parameter snapshot.
    #[must_use]
    pub fn params(&self) -> CloudParams {
        *self.params.read().expect("params lock poisoned")
    }

    /// Sets the ray-march step count.
    pub fn set_steps(&self, steps: f32) -> &Self {
        self.write_params().steps = steps;
        self
    }

    /// Sets the per-step opacity.
    pub fn set_opacity(&self, opacity: f32) -> &Self {
        self.write_params().opacity = opacity;
        self
    }

    /// Sets the smoothstep band half-width.
    pub fn set_range(&self, range: f32) -> &Self {
        self.write_params().range = range;
        self
    }

    /// Sets the density threshold.
    pub fn set_threshold(&self, threshold: f32) -> &Self {
        self.write_params().threshold = threshold;
        self
    }

    /// Sets the model transform.
    pub fn set_transform(&self, transform: Mat4) -> &Self {
        with_state_mut(|state| {
            if let Some(primitive) = state.registry.get_mut("VolumeCloud", &self.name) {
                if let Some(cloud) = primitive.as_any_mut().downcast_mut::<VolumeCloud>() {
                    cloud.set_transform(transform);
                }
            }
            state.update_extents();
        });
        self
    }

    /// Destroys and removes this cloud.
    pub fn remove(self) {
        remove_primitive(&self.name);
    }
}

/// Handle for a registered noise iso-surface.
#[derive(Clone)]
pub struct NoiseIsosurfaceHandle {
    name: String,
    params: Arc<RwLock<IsosurfaceParams>>,
}

impl NoiseIsosurfaceHandle {
    /// Returns the name of this iso-surface.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_params(&self) -> std::sync::RwLockWriteGuard<'_, IsosurfaceParams> {
        self.params.write().expect("params lock poisoned")
    }

    /// Current parameter snapshot.
    #[must_use]
    pub fn params(&self) -> IsosurfaceParams {
        *self.params.read().expect("params lock poisoned")
    }

    /// Sets the ray-march step count.
    pub fn set_steps(&self, steps: f32) -> &Self {
        self.write_params().steps = steps;
        self
    }

    /// Sets the iso-surface threshold.
    pub fn set_threshold(&self, threshold: f32) -> &Self {
        self.write_params().threshold = threshold;
        self
    }

    /// Sets the model transform.
    pub fn set_transform(&self, transform: Mat4) -> &Self {
        with_state_mut(|state| {
            if let Some(primitive) = state.registry.get_mut("NoiseIsosurface", &self.name) {
                if let Some(solid) = primitive.as_any_mut().downcast_mut::<NoiseIsosurface>() {
                    solid.set_transform(transform);
                }
            }
            state.update_extents();
        });
        self
    }

    /// Destroys and removes this iso-surface.
    pub fn remove(self) {
        remove_primitive(&self.name);
    }
}
