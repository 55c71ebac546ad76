//! Configuration options for cumulo.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Global configuration options for cumulo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Whether to automatically fit the camera to the scene on first frame.
    pub auto_fit_camera: bool,

    /// Background color.
    pub background_color: Vec3,

    /// Whether to synchronize presentation with the display refresh rate.
    pub vsync: bool,

    /// Maximum frames per second (0 = unlimited).
    pub max_fps: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_fit_camera: true,
            background_color: Vec3::new(0.1, 0.1, 0.1),
            vsync: true,
            max_fps: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_roundtrip() {
        let options = Options {
            auto_fit_camera: false,
            background_color: Vec3::new(0.2, 0.3, 0.4),
            vsync: false,
            max_fps: 144,
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: Options = serde_json::from_str(&json).unwrap();
        assert!(!back.auto_fit_camera);
        assert_eq!(back.max_fps, 144);
        assert!((back.background_color - options.background_color).length() < 1e-6);
    }
}
