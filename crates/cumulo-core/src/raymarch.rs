//! CPU reference implementation of the volume ray-march.
//!
//! The WGSL programs in the render crate mirror these functions exactly; this
//! module is the testable statement of the algorithm: slab ray/box
//! intersection, obliqueness-scaled stepping, front-to-back compositing for
//! the cloud variant, and first-hit shading for the iso-surface variant.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use glam::{Vec3, Vec4};

use crate::field::ScalarField;

/// Accumulated alpha at which the cloud march stops early.
pub const ALPHA_SATURATION: f32 = 0.95;

/// Boundary band within which the iso-surface normal snaps to a face normal.
pub const FACE_EPSILON: f32 = 1e-4;

/// Central-difference step for gradient probes, in world units.
const GRADIENT_STEP: f32 = 0.01;

/// Tunable parameters for the cloud (alpha compositing) variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudParams {
    /// Number of steps across one box cell span.
    pub steps: f32,
    /// Per-step opacity multiplier.
    pub opacity: f32,
    /// Half-width of the smoothstep band around the threshold.
    pub range: f32,
    /// Density threshold center.
    pub threshold: f32,
    /// Frame counter driving the temporal jitter.
    pub frame: f32,
}

impl Default for CloudParams {
    fn default() -> Self {
        Self {
            steps: 100.0,
            opacity: 0.25,
            range: 0.1,
            threshold: 0.25,
            frame: 0.0,
        }
    }
}

/// Tunable parameters for the iso-surface (first hit) variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsosurfaceParams {
    /// Number of steps across one box cell span.
    pub steps: f32,
    /// Density value defining the surface.
    pub threshold: f32,
}

impl Default for IsosurfaceParams {
    fn default() -> Self {
        Self {
            steps: 200.0,
            threshold: 0.6,
        }
    }
}

/// A density field sampled over normalized `[0, 1]^3` coordinates.
pub trait DensitySource {
    /// Returns the density at `p`, in `[0, 1]`. Coordinates outside the unit
    /// cube clamp to the boundary (the edge-clamped linear sampler the GPU
    /// path binds).
    fn density(&self, p: Vec3) -> f32;
}

impl DensitySource for ScalarField {
    fn density(&self, p: Vec3) -> f32 {
        let n = self.size();
        let nf = n as f32;
        // Texel-center addressing: sample i sits at (i + 0.5) / n.
        let scaled = p * nf - Vec3::splat(0.5);
        let base = scaled.floor();
        let f = scaled - base;

        let clamp_axis = |v: f32| -> u32 {
            if v <= 0.0 {
                0
            } else {
                (v as u32).min(n - 1)
            }
        };
        let x0 = clamp_axis(base.x);
        let y0 = clamp_axis(base.y);
        let z0 = clamp_axis(base.z);
        let x1 = clamp_axis(base.x + 1.0);
        let y1 = clamp_axis(base.y + 1.0);
        let z1 = clamp_axis(base.z + 1.0);

        let at = |x: u32, y: u32, z: u32| f32::from(self.get(x, y, z)) / 255.0;

        let c00 = at(x0, y0, z0) * (1.0 - f.x) + at(x1, y0, z0) * f.x;
        let c10 = at(x0, y1, z0) * (1.0 - f.x) + at(x1, y1, z0) * f.x;
        let c01 = at(x0, y0, z1) * (1.0 - f.x) + at(x1, y0, z1) * f.x;
        let c11 = at(x0, y1, z1) * (1.0 - f.x) + at(x1, y1, z1) * f.x;
        let c0 = c00 * (1.0 - f.y) + c10 * f.y;
        let c1 = c01 * (1.0 - f.y) + c11 * f.y;
        c0 * (1.0 - f.z) + c1 * f.z
    }
}

/// Slab-method intersection of a ray with the box `[-half_dim, +half_dim]`.
///
/// Returns `(t0, t1)`; the ray misses the box iff `t0 > t1`. Callers clamp
/// `t0` to zero so rays starting inside the box do not step backwards.
#[must_use]
pub fn hit_box(origin: Vec3, dir: Vec3, half_dim: Vec3) -> (f32, f32) {
    let inv_dir = dir.recip();
    let tmin_tmp = (-half_dim - origin) * inv_dir;
    let tmax_tmp = (half_dim - origin) * inv_dir;
    let tmin = tmin_tmp.min(tmax_tmp);
    let tmax = tmin_tmp.max(tmax_tmp);
    let t0 = tmin.x.max(tmin.y).max(tmin.z);
    let t1 = tmax.x.min(tmax.y).min(tmax.z);
    (t0, t1)
}

/// Step size along the ray: the smallest per-axis cell traversal distance
/// divided by the step count, so oblique rays step finer.
#[must_use]
pub fn step_delta(dir: Vec3, steps: f32) -> f32 {
    let inc = dir.abs().recip();
    inc.x.min(inc.y).min(inc.z) / steps
}

/// Hermite smoothstep, clamped to `[0, 1]`.
#[must_use]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Converts a linear-light color to sRGB, leaving alpha untouched.
#[must_use]
pub fn linear_to_srgb(value: Vec4) -> Vec4 {
    let convert = |c: f32| -> f32 {
        if c <= 0.003_130_8 {
            c * 12.92
        } else {
            c.powf(0.41666) * 1.055 - 0.055
        }
    };
    Vec4::new(convert(value.x), convert(value.y), convert(value.z), value.w)
}

/// Integer hash used to seed the per-pixel jitter.
#[must_use]
pub fn wang_hash(mut seed: u32) -> u32 {
    seed = (seed ^ 61) ^ (seed >> 16);
    seed = seed.wrapping_mul(9);
    seed ^= seed >> 4;
    seed = seed.wrapping_mul(0x27d4_eb2d);
    seed ^ (seed >> 15)
}

/// Maps a hash seed to a uniform float in `[0, 1)`.
#[must_use]
pub fn rand_from_hash(seed: u32) -> f32 {
    (wang_hash(seed) as f64 / 4_294_967_296.0) as f32
}

/// Jitter seed for a fragment: hash of the pixel coordinate and the frame
/// counter, matching the shader.
#[must_use]
pub fn jitter_seed(pixel_x: u32, pixel_y: u32, frame: u32) -> u32 {
    pixel_x
        .wrapping_mul(1973)
        .wrapping_add(pixel_y.wrapping_mul(9277))
        .wrapping_add(frame.wrapping_mul(26699))
}

/// Samples a world-space point: normalized coordinates are
/// `world / (2 * half_dim)`.
fn get_data<F: DensitySource + ?Sized>(field: &F, half_dim: Vec3, world: Vec3) -> f32 {
    field.density(world / (half_dim * 2.0))
}

/// Density slope along the ray's local frame, probed symmetrically.
fn shading<F: DensitySource + ?Sized>(field: &F, half_dim: Vec3, world: Vec3) -> f32 {
    get_data(field, half_dim, world - Vec3::splat(GRADIENT_STEP))
        - get_data(field, half_dim, world + Vec3::splat(GRADIENT_STEP))
}

/// Marches the cloud variant along one ray.
///
/// `jitter` is the signed start offset in world units (derived from
/// [`jitter_seed`] by the caller; zero for a deterministic march). Returns
/// the sRGB-encoded composited color, or `None` on the discard paths: the ray
/// misses the box, or no alpha accumulates.
pub fn march_cloud<F: DensitySource + ?Sized>(
    field: &F,
    half_dim: Vec3,
    params: &CloudParams,
    base: Vec3,
    origin: Vec3,
    dir: Vec3,
    jitter: f32,
) -> Option<Vec4> {
    let ray_dir = dir.normalize();
    let (t0, t1) = hit_box(origin, ray_dir, half_dim);
    if t0 > t1 {
        return None;
    }
    let t0 = t0.max(0.0);

    let delta = step_delta(ray_dir, params.steps);
    let mut p = origin + t0 * ray_dir + ray_dir * jitter;

    let mut ac = Vec4::new(base.x, base.y, base.z, 0.0);

    let mut t = t0;
    while t < t1 {
        let d = get_data(field, half_dim, p + Vec3::splat(0.5));
        let d = smoothstep(params.threshold - params.range, params.threshold + params.range, d)
            * params.opacity;

        let col = shading(field, half_dim, p + Vec3::splat(0.5)) * 3.0 + (p.x + p.y) * 0.25 + 0.2;

        let remaining = 1.0 - ac.w;
        ac.x += remaining * d * col;
        ac.y += remaining * d * col;
        ac.z += remaining * d * col;
        ac.w += remaining * d;

        if ac.w >= ALPHA_SATURATION {
            break;
        }

        p += ray_dir * delta;
        t += delta;
    }

    let color = linear_to_srgb(ac);
    if color.w == 0.0 {
        return None;
    }
    Some(color)
}

/// Surface normal at a normalized coordinate, with face shortcuts near the
/// six box boundaries to avoid probing outside the texture domain.
fn surface_normal<F: DensitySource + ?Sized>(field: &F, half_dim: Vec3, coord: Vec3) -> Vec3 {
    if coord.x < FACE_EPSILON {
        return Vec3::X;
    }
    if coord.y < FACE_EPSILON {
        return Vec3::Y;
    }
    if coord.z < FACE_EPSILON {
        return Vec3::Z;
    }
    if coord.x > 1.0 - FACE_EPSILON {
        return Vec3::NEG_X;
    }
    if coord.y > 1.0 - FACE_EPSILON {
        return Vec3::NEG_Y;
    }
    if coord.z > 1.0 - FACE_EPSILON {
        return Vec3::NEG_Z;
    }

    let probe = |offset: Vec3| -> f32 { get_data(field, half_dim, coord + offset) };
    let x = probe(Vec3::new(-GRADIENT_STEP, 0.0, 0.0)) - probe(Vec3::new(GRADIENT_STEP, 0.0, 0.0));
    let y = probe(Vec3::new(0.0, -GRADIENT_STEP, 0.0)) - probe(Vec3::new(0.0, GRADIENT_STEP, 0.0));
    let z = probe(Vec3::new(0.0, 0.0, -GRADIENT_STEP)) - probe(Vec3::new(0.0, 0.0, GRADIENT_STEP));
    Vec3::new(x, y, z).normalize_or_zero()
}

/// Marches the iso-surface variant along one ray.
///
/// Stops at the first sample above the threshold and shades it from the
/// surface normal plus a position bias. Returns `None` on the discard paths:
/// the ray misses the box, or no sample crosses the threshold.
pub fn march_isosurface<F: DensitySource + ?Sized>(
    field: &F,
    half_dim: Vec3,
    params: &IsosurfaceParams,
    origin: Vec3,
    dir: Vec3,
) -> Option<Vec4> {
    let ray_dir = dir.normalize();
    let (t0, t1) = hit_box(origin, ray_dir, half_dim);
    if t0 > t1 {
        return None;
    }
    let t0 = t0.max(0.0);

    let delta = step_delta(ray_dir, params.steps);
    let mut p = origin + t0 * ray_dir;

    let mut t = t0;
    while t < t1 {
        let d = get_data(field, half_dim, p + half_dim);
        if d > params.threshold {
            let normal = surface_normal(field, half_dim, p + Vec3::splat(0.5));
            let rgb = normal * 0.5 + (p * 1.5 + Vec3::splat(0.25));
            return Some(Vec4::new(rgb.x, rgb.y, rgb.z, 1.0));
        }
        p += ray_dir * delta;
        t += delta;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    /// Density source with a constant value that counts samples.
    struct CountingSource {
        value: f32,
        samples: Cell<usize>,
    }

    impl CountingSource {
        fn new(value: f32) -> Self {
            Self {
                value,
                samples: Cell::new(0),
            }
        }
    }

    impl DensitySource for CountingSource {
        fn density(&self, _p: Vec3) -> f32 {
            self.samples.set(self.samples.get() + 1);
            self.value
        }
    }

    #[test]
    fn test_hit_box_through_center() {
        let (t0, t1) = hit_box(Vec3::new(0.0, 0.0, -10.0), Vec3::Z, Vec3::ONE);
        assert!((t0 - 9.0).abs() < 1e-5, "t0 = {t0}");
        assert!((t1 - 11.0).abs() < 1e-5, "t1 = {t1}");
    }

    #[test]
    fn test_hit_box_pointing_away() {
        // A ray beside the box whose line never crosses it.
        let (t0, t1) = hit_box(Vec3::new(0.0, 0.0, -10.0), Vec3::X, Vec3::ONE);
        assert!(t0 > t1, "ray pointing away should miss: t0={t0}, t1={t1}");
    }

    #[test]
    fn test_hit_box_behind_interval_is_negative() {
        // The box behind the ray yields a wholly negative interval; the
        // entry clamp then empties the march range.
        let (t0, t1) = hit_box(Vec3::new(0.0, 0.0, -10.0), Vec3::NEG_Z, Vec3::ONE);
        assert!(t0 <= t1);
        assert!(t1 < 0.0);
    }

    #[test]
    fn test_hit_box_offset_miss() {
        let (t0, t1) = hit_box(Vec3::new(5.0, 0.0, -10.0), Vec3::Z, Vec3::ONE);
        assert!(t0 > t1, "parallel ray outside the box should miss");
    }

    #[test]
    fn test_hit_box_origin_inside() {
        let (t0, t1) = hit_box(Vec3::ZERO, Vec3::X, Vec3::ONE);
        assert!(t0 <= 0.0 && t1 > 0.0);
        // The march clamps the entry to zero so it never steps backwards.
        assert!((t0.max(0.0) - 0.0).abs() < 1e-6);
        assert!((t1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_step_delta_axis_aligned() {
        let delta = step_delta(Vec3::Z, 100.0);
        assert!((delta - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_step_delta_oblique_is_finer() {
        let axis = step_delta(Vec3::Z, 100.0);
        let oblique = step_delta(Vec3::new(1.0, 1.0, 1.0).normalize(), 100.0);
        assert!(oblique > axis, "diagonal ray spans cells over a longer run");
        // The per-axis inverse is sqrt(3) for a normalized diagonal.
        assert!((oblique - (3.0f32).sqrt() / 100.0).abs() < 1e-5);
    }

    #[test]
    fn test_cloud_zero_density_discards() {
        let source = CountingSource::new(0.0);
        let result = march_cloud(
            &source,
            Vec3::splat(0.5),
            &CloudParams::default(),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            0.0,
        );
        assert!(result.is_none(), "zero density must accumulate zero alpha");
        assert!(source.samples.get() > 0, "the march should have sampled");
    }

    #[test]
    fn test_cloud_miss_discards_without_sampling() {
        let source = CountingSource::new(1.0);
        let result = march_cloud(
            &source,
            Vec3::splat(0.5),
            &CloudParams::default(),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::X,
            0.0,
        );
        assert!(result.is_none());
        assert_eq!(source.samples.get(), 0, "missed rays must not sample");
    }

    #[test]
    fn test_cloud_box_behind_ray_discards() {
        // t0 < t1 but both negative: the entry clamp leaves nothing to march.
        let source = CountingSource::new(1.0);
        let result = march_cloud(
            &source,
            Vec3::splat(0.5),
            &CloudParams::default(),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::NEG_Z,
            0.0,
        );
        assert!(result.is_none());
        assert_eq!(source.samples.get(), 0);
    }

    #[test]
    fn test_cloud_early_out_stops_sampling() {
        // Dense medium: per-step alpha is opacity = 0.25, so accumulated
        // alpha crosses 0.95 after 10 steps; a full traversal would take 100.
        let source = CountingSource::new(1.0);
        let params = CloudParams {
            threshold: 0.25,
            range: 0.1,
            opacity: 0.25,
            steps: 100.0,
            frame: 0.0,
        };
        let result = march_cloud(
            &source,
            Vec3::splat(0.5),
            &params,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            0.0,
        )
        .expect("opaque medium must composite");

        // Each step takes 1 density sample + 2 shading probes.
        let steps_taken = source.samples.get() / 3;
        assert!(
            steps_taken < 15,
            "early-out should stop after ~10 steps, took {steps_taken}"
        );

        // Alpha equals the accumulated value at the break point, not 1.0.
        let expected = 1.0 - 0.75f32.powi(steps_taken as i32);
        assert!(
            (result.w - expected).abs() < 1e-4,
            "alpha {} != break-point value {expected}",
            result.w
        );
        assert!(result.w >= ALPHA_SATURATION);
    }

    #[test]
    fn test_cloud_compositing_monotonic_alpha() {
        let source = CountingSource::new(0.5);
        let params = CloudParams {
            opacity: 0.05,
            ..CloudParams::default()
        };
        let result = march_cloud(
            &source,
            Vec3::splat(0.5),
            &params,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            0.0,
        )
        .expect("non-zero density must composite");
        assert!(result.w > 0.0 && result.w <= 1.0);
    }

    #[test]
    fn test_jitter_seed_matches_shader_constants() {
        assert_eq!(jitter_seed(1, 0, 0), 1973);
        assert_eq!(jitter_seed(0, 1, 0), 9277);
        assert_eq!(jitter_seed(0, 0, 1), 26699);
        // Deterministic per (pixel, frame).
        assert_eq!(jitter_seed(7, 11, 3), jitter_seed(7, 11, 3));
    }

    #[test]
    fn test_rand_from_hash_range() {
        for seed in [0u32, 1, 42, 0xffff_ffff] {
            let r = rand_from_hash(seed);
            assert!((0.0..1.0).contains(&r), "rand out of range: {r}");
        }
    }

    #[test]
    fn test_linear_to_srgb_endpoints() {
        let black = linear_to_srgb(Vec4::new(0.0, 0.0, 0.0, 0.5));
        assert!(black.x.abs() < 1e-6);
        assert!((black.w - 0.5).abs() < 1e-6, "alpha must pass through");
        let white = linear_to_srgb(Vec4::new(1.0, 1.0, 1.0, 1.0));
        assert!((white.x - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_isosurface_first_hit() {
        // Uniform density above the threshold: the surface is hit at the box
        // entry face and the normal snaps to the face shortcut.
        let source = CountingSource::new(1.0);
        let params = IsosurfaceParams {
            steps: 200.0,
            threshold: 0.6,
        };
        let result = march_isosurface(
            &source,
            Vec3::splat(0.5),
            &params,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
        )
        .expect("dense solid must hit");
        assert!((result.w - 1.0).abs() < 1e-6);
        // First hit means a single density sample before the normal probes.
        assert!(source.samples.get() <= 2 + 6);
    }

    #[test]
    fn test_isosurface_miss_discards() {
        let source = CountingSource::new(0.0);
        let params = IsosurfaceParams::default();
        let result = march_isosurface(
            &source,
            Vec3::splat(0.5),
            &params,
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
        );
        assert!(result.is_none(), "no crossing means discard");
    }

    #[test]
    fn test_surface_normal_face_shortcuts() {
        let source = CountingSource::new(0.5);
        let h = Vec3::splat(0.5);
        assert_eq!(surface_normal(&source, h, Vec3::new(0.0, 0.5, 0.5)), Vec3::X);
        assert_eq!(surface_normal(&source, h, Vec3::new(0.5, 0.0, 0.5)), Vec3::Y);
        assert_eq!(surface_normal(&source, h, Vec3::new(0.5, 0.5, 0.0)), Vec3::Z);
        assert_eq!(
            surface_normal(&source, h, Vec3::new(1.0, 0.5, 0.5)),
            Vec3::NEG_X
        );
        assert_eq!(
            surface_normal(&source, h, Vec3::new(0.5, 1.0, 0.5)),
            Vec3::NEG_Y
        );
        assert_eq!(
            surface_normal(&source, h, Vec3::new(0.5, 0.5, 1.0)),
            Vec3::NEG_Z
        );
        // No gradient probes on any shortcut path.
        assert_eq!(source.samples.get(), 0);
    }

    #[test]
    fn test_field_density_trilinear() {
        // A 2^3 field with one bright corner: density at the bright texel
        // center is 1, at the opposite corner 0, and in between it blends.
        let mut samples = vec![0u8; 8];
        samples[0] = 255;
        let field = ScalarField::from_samples(2, samples).unwrap();
        assert!((field.density(Vec3::splat(0.25)) - 1.0).abs() < 1e-6);
        assert!(field.density(Vec3::splat(0.75)).abs() < 1e-6);
        let mid = field.density(Vec3::splat(0.5));
        assert!(mid > 0.0 && mid < 1.0, "midpoint should blend: {mid}");
    }

    proptest! {
        #[test]
        fn prop_hit_box_interval_ordering(
            ox in -20.0f32..20.0, oy in -20.0f32..20.0, oz in -20.0f32..20.0,
            dx in -1.0f32..1.0, dy in -1.0f32..1.0, dz in -1.0f32..1.0,
        ) {
            let dir = Vec3::new(dx, dy, dz);
            prop_assume!(dir.length() > 1e-3);
            let dir = dir.normalize();
            let origin = Vec3::new(ox, oy, oz);
            let (t0, t1) = hit_box(origin, dir, Vec3::ONE);
            if t0 <= t1 {
                // Entry and exit points must lie on (or within) the box.
                for t in [t0, t1] {
                    let p = origin + dir * t;
                    prop_assert!(p.abs().max_element() <= 1.0 + 1e-3);
                }
            }
        }

        #[test]
        fn prop_ray_through_center_hits(
            ox in -10.0f32..10.0, oy in -10.0f32..10.0, oz in 2.0f32..10.0,
        ) {
            let origin = Vec3::new(ox, oy, oz);
            let dir = (-origin).normalize();
            let (t0, t1) = hit_box(origin, dir, Vec3::ONE);
            prop_assert!(t0 <= t1, "ray aimed at the center must hit");
        }
    }
}
