//! Dense 3D scalar fields and their procedural generators.
//!
//! A [`ScalarField`] is a cube of 8-bit density samples, generated once and
//! immutable afterwards. The flat sample order is an external contract: the
//! volume texture upload reinterprets the buffer using the same
//! `x + y*size + z*size^2` layout.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use crate::error::{CumuloError, Result};
use crate::perlin;

/// An owned, immutable cube of 8-bit density samples.
///
/// Samples are stored row-major with `index = x + y*size + z*size^2`.
#[derive(Debug, Clone)]
pub struct ScalarField {
    size: u32,
    samples: Vec<u8>,
}

/// Truncating 8-bit wrap of a floating-point sample value.
#[inline]
fn wrap_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.trunc() as i64).rem_euclid(256) as u8
}

impl ScalarField {
    /// Wraps an existing sample buffer.
    ///
    /// # Errors
    /// Returns [`CumuloError::InvalidFieldSize`] for `size == 0` and
    /// [`CumuloError::SizeMismatch`] when the buffer is not `size^3` long.
    pub fn from_samples(size: u32, samples: Vec<u8>) -> Result<Self> {
        if size == 0 {
            return Err(CumuloError::InvalidFieldSize(size));
        }
        let expected = (size as usize).pow(3);
        if samples.len() != expected {
            return Err(CumuloError::SizeMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { size, samples })
    }

    /// Generates the cloud field: noise modulated by a soft spherical mask.
    ///
    /// # Errors
    /// Returns [`CumuloError::InvalidFieldSize`] for `size == 0`.
    pub fn cloud(size: u32, scale: f32) -> Result<Self> {
        Self::cloud_with(size, scale, perlin::noise)
    }

    /// Cloud variant with an injectable noise function (`[-1, 1]`-valued).
    ///
    /// For each cell, the position is centered and normalized to roughly
    /// `[-0.5, 0.5]`, the mask is `d = 1 - |v|` (left unclamped), and the
    /// sample is `(128 + 128*noise) * d^2`.
    ///
    /// # Errors
    /// Returns [`CumuloError::InvalidFieldSize`] for `size == 0`.
    pub fn cloud_with(
        size: u32,
        scale: f32,
        noise: impl Fn(f64, f64, f64) -> f64,
    ) -> Result<Self> {
        if size == 0 {
            return Err(CumuloError::InvalidFieldSize(size));
        }
        let n = size as usize;
        let mut samples = Vec::with_capacity(n * n * n);
        let half = f64::from(size) / 2.0;
        let scale = f64::from(scale);

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let vx = (f64::from(x) - half) / f64::from(size);
                    let vy = (f64::from(y) - half) / f64::from(size);
                    let vz = (f64::from(z) - half) / f64::from(size);
                    let d = 1.0 - (vx * vx + vy * vy + vz * vz).sqrt();
                    let value = 128.0
                        + 128.0
                            * noise(
                                f64::from(x) * scale / 1.5,
                                f64::from(y) * scale,
                                f64::from(z) * scale / 1.5,
                            );
                    samples.push(wrap_u8(value * d * d));
                }
            }
        }
        log::debug!("generated {size}^3 cloud field (scale {scale})");
        Ok(Self { size, samples })
    }

    /// Generates the raw noise solid used by the iso-surface renderer.
    ///
    /// # Errors
    /// Returns [`CumuloError::InvalidFieldSize`] for `size == 0`.
    pub fn noise_solid(size: u32) -> Result<Self> {
        Self::noise_solid_with(size, perlin::noise)
    }

    /// Noise-solid variant with an injectable noise function.
    ///
    /// Coordinates are normalized to `[0, 1)` and the sample is
    /// `noise(dx*6.5, dy*6.5, dz*6.5) * 128 + 128`.
    ///
    /// # Errors
    /// Returns [`CumuloError::InvalidFieldSize`] for `size == 0`.
    pub fn noise_solid_with(size: u32, noise: impl Fn(f64, f64, f64) -> f64) -> Result<Self> {
        if size == 0 {
            return Err(CumuloError::InvalidFieldSize(size));
        }
        let n = size as usize;
        let mut samples = Vec::with_capacity(n * n * n);

        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let dx = f64::from(x) / f64::from(size);
                    let dy = f64::from(y) / f64::from(size);
                    let dz = f64::from(z) / f64::from(size);
                    let d = noise(dx * 6.5, dy * 6.5, dz * 6.5);
                    samples.push(wrap_u8(d * 128.0 + 128.0));
                }
            }
        }
        log::debug!("generated {size}^3 noise solid field");
        Ok(Self { size, samples })
    }

    /// Returns the cube edge length in samples.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the total number of samples (`size^3`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the field holds no samples. Never true for a
    /// successfully constructed field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Flattens a 3D sample index to the linear buffer index.
    #[must_use]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let s = self.size as usize;
        x as usize + y as usize * s + z as usize * s * s
    }

    /// Returns the sample at the given 3D index.
    ///
    /// # Panics
    /// Panics if any coordinate is out of range.
    #[must_use]
    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        assert!(
            x < self.size && y < self.size && z < self.size,
            "sample index ({x}, {y}, {z}) out of range for size {}",
            self.size
        );
        self.samples[self.index(x, y, z)]
    }

    /// Returns the raw sample buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.samples
    }

    /// Square staging dimension, `ceil(sqrt(len))`.
    ///
    /// The upload path passes the flat buffer with explicit row strides, so
    /// this is advisory metadata for 2D staging allocations rather than an
    /// upload parameter.
    #[must_use]
    pub fn staging_dim(&self) -> u32 {
        (self.samples.len() as f64).sqrt().ceil() as u32
    }
}
