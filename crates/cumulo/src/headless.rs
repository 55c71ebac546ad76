//! Headless rendering API for cumulo.
//!
//! Renders the current scene to an image buffer or file without opening a
//! window. Useful for integration tests and batch captures.

use pollster::FutureExt;

use cumulo_render::RenderEngine;

use crate::state::{with_state, with_state_mut};
use crate::{CumuloError, Result};

/// Renders the current scene to a file.
///
/// Creates a headless GPU context, renders one frame of all registered
/// primitives with the camera fitted to the scene, and saves the result as a
/// PNG or JPEG image.
///
/// # Errors
/// Fails when no GPU adapter is available or the file cannot be written.
pub fn render_to_file(filename: &str, width: u32, height: u32) -> Result<()> {
    let data = render_to_image(width, height)?;
    cumulo_render::save_image(filename, &data, width, height)
        .map_err(|e| CumuloError::RenderError(format!("failed to save image: {e}")))
}

/// Renders the current scene to a raw RGBA pixel buffer.
///
/// The returned buffer holds `width * height * 4` bytes, row-major from the
/// top-left.
///
/// # Errors
/// Fails when no GPU adapter is available or the capture readback fails.
pub fn render_to_image(width: u32, height: u32) -> Result<Vec<u8>> {
    let mut engine = RenderEngine::new_headless(width, height)
        .block_on()
        .map_err(|e| CumuloError::RenderError(format!("failed to create headless engine: {e}")))?;

    // Each headless render uses a fresh device, so primitives must drop GPU
    // resources retained from a previous one.
    with_state_mut(|state| {
        for primitive in state.registry.iter_mut() {
            primitive.refresh();
        }
    });

    let (min, max) = with_state_mut(|state| {
        state.update_extents();
        state.bounding_box
    });
    engine.camera.look_at_box(min, max);

    let background = with_state(|s| s.options.background_color);
    with_state_mut(|state| engine.render_to_capture(state.registry.iter_mut(), background))
        .map_err(|e| CumuloError::RenderError(format!("headless render failed: {e}")))?;

    engine
        .capture_frame()
        .map_err(|e| CumuloError::RenderError(format!("frame capture failed: {e}")))
}
