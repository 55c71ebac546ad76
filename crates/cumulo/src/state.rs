//! Global state management for cumulo.

use std::sync::{OnceLock, RwLock};

use glam::Vec3;

use cumulo_core::{CumuloError, Options, Result};

use crate::registry::Registry;

/// Global state singleton.
static STATE: OnceLock<RwLock<State>> = OnceLock::new();

/// The global state containing the registry and options.
pub struct State {
    /// Whether cumulo has been initialized.
    pub initialized: bool,

    /// The primitive registry.
    pub registry: Registry,

    /// Global options.
    pub options: Options,

    /// Representative length scale for all registered primitives.
    pub length_scale: f32,

    /// Axis-aligned bounding box for all registered primitives.
    pub bounding_box: (Vec3, Vec3),
}

impl Default for State {
    fn default() -> Self {
        Self {
            initialized: false,
            registry: Registry::new(),
            options: Options::default(),
            length_scale: 1.0,
            bounding_box: (Vec3::splat(-0.5), Vec3::splat(0.5)),
        }
    }
}

impl State {
    /// Computes the center of the bounding box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.bounding_box.0 + self.bounding_box.1) * 0.5
    }

    /// Updates the global bounding box and length scale from all primitives.
    pub fn update_extents(&mut self) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut has_extent = false;

        for primitive in self.registry.iter() {
            if let Some((bb_min, bb_max)) = primitive.bounding_box() {
                min = min.min(bb_min);
                max = max.max(bb_max);
                has_extent = true;
            }
        }

        if has_extent {
            self.bounding_box = (min, max);
            self.length_scale = (max - min).length();
        } else {
            self.bounding_box = (Vec3::splat(-0.5), Vec3::splat(0.5));
            self.length_scale = 1.0;
        }
    }
}

/// Initializes the global state.
///
/// # Errors
/// Returns [`CumuloError::AlreadyInitialized`] when called while initialized.
pub fn init_state() -> Result<()> {
    let lock = STATE.get_or_init(|| RwLock::new(State::default()));
    let mut state = lock.write().expect("state lock poisoned");
    if state.initialized {
        return Err(CumuloError::AlreadyInitialized);
    }
    state.initialized = true;
    Ok(())
}

/// Returns whether the state has been initialized.
#[must_use]
pub fn is_initialized() -> bool {
    STATE
        .get()
        .and_then(|lock| lock.read().ok())
        .is_some_and(|state| state.initialized)
}

/// Shuts down: destroys and removes all primitives, resets options.
pub fn shutdown_state() {
    if let Some(lock) = STATE.get() {
        let mut state = lock.write().expect("state lock poisoned");
        for primitive in state.registry.iter_mut() {
            primitive.destroy();
        }
        state.registry.clear();
        state.options = Options::default();
        state.initialized = false;
    }
}

/// Access the global state for reading.
///
/// # Panics
/// Panics if cumulo has not been initialized.
pub fn with_state<F, R>(f: F) -> R
where
    F: FnOnce(&State) -> R,
{
    let lock = STATE.get().expect("cumulo not initialized");
    let guard = lock.read().expect("state lock poisoned");
    f(&guard)
}

/// Access the global state for writing.
///
/// # Panics
/// Panics if cumulo has not been initialized.
pub fn with_state_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut State) -> R,
{
    let lock = STATE.get().expect("cumulo not initialized");
    let mut guard = lock.write().expect("state lock poisoned");
    f(&mut guard)
}
