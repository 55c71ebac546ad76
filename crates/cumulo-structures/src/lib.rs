//! Renderable primitives for cumulo.
//!
//! Each primitive composes one draw unit: a bounding box, a scalar field, a
//! ray-march shader pair, and per-frame uniform providers. Resources are
//! built lazily on first use and cached for the primitive's lifetime.

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

pub mod box_geometry;
pub mod cloud;
pub mod isosurface;

pub use box_geometry::{BoxGeometry, BoxMesh};
pub use cloud::VolumeCloud;
pub use isosurface::NoiseIsosurface;
