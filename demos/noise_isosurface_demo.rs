//! Demo showing the iso-surfaced noise solid.
//!
//! Generates a raw 128^3 Perlin noise field and renders the iso-surface at
//! the configured threshold: the ray march stops at the first density sample
//! above it and shades from the field gradient.

use cumulo::{self, Vec3};

fn main() {
    // Initialize cumulo
    cumulo::init().expect("Failed to initialize cumulo");

    let solid = cumulo::register_noise_isosurface("noise solid", Vec3::ONE, 128)
        .expect("Failed to register noise isosurface");

    solid.set_steps(200.0).set_threshold(0.6);

    println!("Noise isosurface demo running...");
    println!("Controls:");
    println!("  - Left drag: Orbit camera");
    println!("  - Right drag: Pan camera");
    println!("  - Scroll: Zoom");
    println!("  - ESC: Exit");

    // Show the viewer
    cumulo::show();
}
