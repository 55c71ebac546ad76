//! Per-frame state and the renderable primitive contract.

use std::any::Any;
use std::sync::Arc;

use glam::Vec3;

use crate::command::DrawCommand;
use crate::context::Context;
use crate::shader::ShaderCache;

/// The envelope the host frame loop hands to every primitive once per frame.
pub struct FrameState<'a> {
    /// The active graphics context.
    pub context: &'a Context,
    /// The shared shader program cache.
    pub shaders: &'a mut ShaderCache,
    /// The frame's appendable command list.
    pub command_list: &'a mut Vec<Arc<DrawCommand>>,
    /// Monotonic frame counter.
    pub frame_number: u64,
}

/// A renderable the host frame loop dispatches against.
///
/// `update` is invoked synchronously once per rendered frame and must not
/// block; its only externally observable action is appending at most one
/// draw command to the frame's list (zero when geometry or texture
/// construction is not possible yet — a silent skip, retried next frame).
pub trait Primitive: Any + Send + Sync {
    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to self as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The unique name of this primitive.
    fn name(&self) -> &str;

    /// The type name of this primitive (e.g. "`VolumeCloud`").
    fn kind(&self) -> &'static str;

    /// Called once per rendered frame; lazily builds GPU resources on first
    /// use and contributes the cached draw command.
    fn update(&mut self, frame: &mut FrameState<'_>);

    /// Returns whether this primitive has been destroyed. Destroyed
    /// primitives are skipped by the frame loop and must not be updated.
    fn is_destroyed(&self) -> bool;

    /// Destroys owned GPU resources and flags the primitive destroyed.
    fn destroy(&mut self);

    /// Drops cached GPU resources so they are rebuilt on next use (e.g.
    /// after a device change or a sampler swap).
    fn refresh(&mut self);

    /// Axis-aligned bounding box in world coordinates, if any.
    fn bounding_box(&self) -> Option<(Vec3, Vec3)>;
}
