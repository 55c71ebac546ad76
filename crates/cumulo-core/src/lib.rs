//! Core abstractions for cumulo.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`ScalarField`] and its procedural generators (cloud and noise solid)
//! - [`perlin`] — the Improved Perlin noise the generators sample
//! - [`raymarch`] — the CPU reference of the per-fragment ray-march that the
//!   WGSL programs in `cumulo-render` mirror
//! - Configuration options and the library error type

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod field;
pub mod options;
pub mod perlin;
pub mod raymarch;

pub use error::{CumuloError, Result};
pub use field::ScalarField;
pub use options::Options;
pub use raymarch::{
    hit_box, march_cloud, march_isosurface, step_delta, CloudParams, DensitySource,
    IsosurfaceParams, ALPHA_SATURATION, FACE_EPSILON,
};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};
