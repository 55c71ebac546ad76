//! Bounding box geometry for volume primitives.

use glam::Vec3;

/// An axis-aligned box centered at the origin, described by its full extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    /// Full edge lengths along each axis.
    pub dimensions: Vec3,
}

impl BoxGeometry {
    /// Creates a box with the given full extents.
    #[must_use]
    pub fn new(dimensions: Vec3) -> Self {
        Self { dimensions }
    }

    /// Half extents, the `[-half, +half]` bounds the ray-march intersects.
    #[must_use]
    pub fn half_dim(&self) -> Vec3 {
        self.dimensions / 2.0
    }

    /// Tessellates the box into position-only vertices and triangle indices.
    ///
    /// Returns `None` for degenerate dimensions (non-positive or non-finite);
    /// callers treat that as "nothing to draw" rather than an error, since
    /// the dimensions are caller-controlled.
    #[must_use]
    pub fn tessellate(&self) -> Option<BoxMesh> {
        let d = self.dimensions;
        if !d.is_finite() || d.min_element() <= 0.0 {
            return None;
        }
        let h = self.half_dim();

        let positions = vec![
            [-h.x, -h.y, -h.z], // 0
            [h.x, -h.y, -h.z],  // 1
            [h.x, h.y, -h.z],   // 2
            [-h.x, h.y, -h.z],  // 3
            [-h.x, -h.y, h.z],  // 4
            [h.x, -h.y, h.z],   // 5
            [h.x, h.y, h.z],    // 6
            [-h.x, h.y, h.z],   // 7
        ];

        // 6 faces, 2 triangles each. Winding is irrelevant: volume commands
        // draw with culling disabled.
        let indices = vec![
            0, 1, 2, 0, 2, 3, // -Z
            4, 6, 5, 4, 7, 6, // +Z
            0, 4, 5, 0, 5, 1, // -Y
            3, 2, 6, 3, 6, 7, // +Y
            0, 3, 7, 0, 7, 4, // -X
            1, 5, 6, 1, 6, 2, // +X
        ];

        Some(BoxMesh { positions, indices })
    }
}

/// Tessellated box geometry ready for upload.
#[derive(Debug, Clone)]
pub struct BoxMesh {
    /// Corner positions (xyz).
    pub positions: Vec<[f32; 3]>,
    /// Triangle indices into `positions`.
    pub indices: Vec<u32>,
}

impl BoxMesh {
    /// Radius of the bounding sphere around the origin.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.positions
            .iter()
            .map(|p| Vec3::from_array(*p).length())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tessellate_unit_box() {
        let mesh = BoxGeometry::new(Vec3::ONE).tessellate().unwrap();
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.indices.len(), 36);
        for p in &mesh.positions {
            assert!(p.iter().all(|c| c.abs() <= 0.5 + f32::EPSILON));
        }
        for &i in &mesh.indices {
            assert!((i as usize) < mesh.positions.len());
        }
        // Every corner must be referenced.
        for corner in 0..8u32 {
            assert!(mesh.indices.contains(&corner), "corner {corner} unused");
        }
    }

    #[test]
    fn test_degenerate_dimensions_skip() {
        assert!(BoxGeometry::new(Vec3::ZERO).tessellate().is_none());
        assert!(BoxGeometry::new(Vec3::new(1.0, -1.0, 1.0)).tessellate().is_none());
        assert!(BoxGeometry::new(Vec3::new(1.0, f32::NAN, 1.0)).tessellate().is_none());
        assert!(BoxGeometry::new(Vec3::new(1.0, f32::INFINITY, 1.0)).tessellate().is_none());
    }

    #[test]
    fn test_half_dim() {
        let geometry = BoxGeometry::new(Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(geometry.half_dim(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_bounding_radius() {
        let mesh = BoxGeometry::new(Vec3::splat(2.0)).tessellate().unwrap();
        let expected = (3.0f32).sqrt();
        assert!((mesh.bounding_radius() - expected).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_vertices_within_half_extents(
            dx in 0.01f32..100.0, dy in 0.01f32..100.0, dz in 0.01f32..100.0,
        ) {
            let geometry = BoxGeometry::new(Vec3::new(dx, dy, dz));
            let h = geometry.half_dim();
            let mesh = geometry.tessellate().unwrap();
            prop_assert_eq!(mesh.indices.len(), 36);
            for p in &mesh.positions {
                prop_assert!(p[0].abs() <= h.x + f32::EPSILON * dx);
                prop_assert!(p[1].abs() <= h.y + f32::EPSILON * dy);
                prop_assert!(p[2].abs() <= h.z + f32::EPSILON * dz);
            }
        }
    }
}
