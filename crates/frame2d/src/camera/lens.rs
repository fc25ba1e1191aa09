//! Orthographic projection state for the framing camera

use crate::foundation::math::{Vec2, Vec3};

/// Minimum effective pixels-per-unit; guards divisions by zero.
pub const MIN_PIXELS_PER_UNIT: f32 = 1e-6;

/// Orthographic camera projection: viewport, half-height, and far plane
///
/// The viewport is fed by the embedding application (typically once per
/// frame, or on resize events).
#[derive(Debug, Clone, PartialEq)]
pub struct CameraLens {
    viewport: Vec2,
    orthographic_size: f32,
    far_plane: f32,
}

impl Default for CameraLens {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

impl CameraLens {
    /// Create a lens for the given viewport size in pixels
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            viewport: Vec2::new(viewport_width, viewport_height),
            orthographic_size: 5.0,
            far_plane: 1000.0,
        }
    }

    /// Get the viewport size in pixels
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Set the viewport size in pixels
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Vec2::new(width, height);
    }

    /// Get the width/height aspect ratio
    pub fn aspect(&self) -> f32 {
        if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        }
    }

    /// Get the orthographic half-height in world units
    pub fn orthographic_size(&self) -> f32 {
        self.orthographic_size
    }

    /// Set the orthographic half-height in world units
    pub fn set_orthographic_size(&mut self, size: f32) {
        self.orthographic_size = size;
    }

    /// Get the far clip plane distance
    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    /// Derive the orthographic size so one world unit maps to exactly
    /// `pixels_per_unit` screen pixels
    pub fn autoset_orthographic_size(&mut self, pixels_per_unit: f32) {
        let pixels_per_unit = pixels_per_unit.max(MIN_PIXELS_PER_UNIT);
        self.orthographic_size = self.viewport.y / (2.0 * pixels_per_unit);
    }

    /// The four far-plane frustum corners in camera-local space
    ///
    /// Order: bottom-left, top-left, top-right, bottom-right; corners 0 and
    /// 2 are diagonal opposites.
    pub fn frustum_corners(&self) -> [Vec3; 4] {
        let half_height = self.orthographic_size;
        let half_width = half_height * self.aspect();
        let z = self.far_plane;
        [
            Vec3::new(-half_width, -half_height, z),
            Vec3::new(-half_width, half_height, z),
            Vec3::new(half_width, half_height, z),
            Vec3::new(half_width, -half_height, z),
        ]
    }
}
