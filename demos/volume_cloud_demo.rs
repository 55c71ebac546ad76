//! Demo showing the ray-marched volume cloud.
//!
//! Generates a 128^3 scalar field (Perlin noise under a soft spherical mask)
//! and renders it by per-pixel front-to-back compositing with temporal
//! dithering.

use cumulo::{self, Vec3};

fn main() {
    // Initialize cumulo
    cumulo::init().expect("Failed to initialize cumulo");

    let cloud = cumulo::register_volume_cloud("cloud", Vec3::ONE, 128, 0.05)
        .expect("Failed to register volume cloud");

    // The defaults match the classic look; tweak freely.
    cloud.set_steps(100.0).set_opacity(0.25).set_range(0.1).set_threshold(0.25);

    println!("Volume cloud demo running...");
    println!("Controls:");
    println!("  - Left drag: Orbit camera");
    println!("  - Right drag: Pan camera");
    println!("  - Scroll: Zoom");
    println!("  - ESC: Exit");

    // Show the viewer
    cumulo::show();
}
