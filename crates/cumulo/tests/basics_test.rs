//! Basic integration tests for cumulo.
//!
//! Note: Due to cumulo using global state that can only be initialized once
//! per process (OnceLock), all tests are combined into a single test function.
//!
//! Tests that require a window (show()) are marked #[ignore]
//! and should be run manually with: cargo test -- --ignored

use cumulo::*;

/// Main integration test that runs all basic tests in sequence.
#[test]
fn test_basics() {
    // Initialize cumulo
    init().expect("init failed");
    assert!(is_initialized());
    assert!(matches!(init(), Err(CumuloError::AlreadyInitialized)));

    // Test 1: Register a volume cloud
    {
        let cloud =
            register_volume_cloud("test cloud", Vec3::ONE, 16, 0.05).expect("register failed");
        assert_eq!(cloud.name(), "test cloud");

        assert!(get_volume_cloud("test cloud").is_some());
        assert!(get_volume_cloud("nonexistent").is_none());

        // Duplicate names are rejected
        assert!(matches!(
            register_volume_cloud("test cloud", Vec3::ONE, 16, 0.05),
            Err(CumuloError::PrimitiveExists(_))
        ));

        // Zero-sized fields are rejected before anything is registered
        assert!(matches!(
            register_volume_cloud("empty", Vec3::ONE, 0, 0.05),
            Err(CumuloError::InvalidFieldSize(0))
        ));
        assert!(get_volume_cloud("empty").is_none());
    }

    // Test 2: Register a noise iso-surface
    {
        let solid =
            register_noise_isosurface("test solid", Vec3::ONE, 16).expect("register failed");
        assert_eq!(solid.name(), "test solid");

        assert!(get_noise_isosurface("test solid").is_some());
        assert!(get_noise_isosurface("nonexistent").is_none());
        // Kinds are namespaced: the cloud name does not resolve as a solid.
        assert!(get_noise_isosurface("test cloud").is_none());
    }

    // Test 3: Parameter setters flow through the shared handle
    {
        let cloud = get_volume_cloud("test cloud").unwrap();
        cloud.set_steps(50.0).set_opacity(0.5).set_threshold(0.3).set_range(0.05);
        let params = cloud.params();
        assert!((params.steps - 50.0).abs() < 1e-6);
        assert!((params.opacity - 0.5).abs() < 1e-6);
        assert!((params.threshold - 0.3).abs() < 1e-6);
        assert!((params.range - 0.05).abs() < 1e-6);

        let solid = get_noise_isosurface("test solid").unwrap();
        solid.set_threshold(0.7).set_steps(150.0);
        let params = solid.params();
        assert!((params.threshold - 0.7).abs() < 1e-6);
        assert!((params.steps - 150.0).abs() < 1e-6);
    }

    // Test 4: Transforms update scene extents
    {
        let cloud = get_volume_cloud("test cloud").unwrap();
        cloud.set_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let bb = with_state_mut(|state| {
            state.update_extents();
            state.bounding_box
        });
        assert!(bb.1.x > 9.0, "extents should follow the moved cloud");
    }

    // Test 5: Remove primitive
    {
        register_volume_cloud("to_remove", Vec3::ONE, 8, 0.05).expect("register failed");
        assert!(get_volume_cloud("to_remove").is_some());

        remove_primitive("to_remove");
        assert!(get_volume_cloud("to_remove").is_none());
    }

    // Test 6: Remove all primitives
    {
        remove_all_primitives();
        assert!(get_volume_cloud("test cloud").is_none());
        assert!(get_noise_isosurface("test solid").is_none());
        assert!(with_state(|state| state.registry.is_empty()));
    }

    // Shutdown
    shutdown();
    assert!(!is_initialized());
}

/// This test requires a display and opens a window.
/// Run with: cargo test test_show_window -- --ignored
#[test]
#[ignore]
fn test_show_window() {
    init().expect("init failed");

    register_volume_cloud("demo cloud", Vec3::ONE, 128, 0.05).expect("register failed");

    show();

    shutdown();
}
