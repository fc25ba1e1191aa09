//! Per-frame camera framing control loop
//!
//! Position: the target's offset from the camera is clamped into a deadzone
//! rectangle derived from the projection frustum, and the camera moves by
//! whatever the clamp removed, with optional snapping to a virtual pixel
//! grid. Rotation: a time-bounded spherical blend between the configured
//! "world" orientation and the target's yaw-only orientation, retriggered
//! whenever the desired rotation reference changes.
//!
//! Run `update` after anything that moves or rotates the target for the
//! frame, otherwise the camera lags one frame behind.

use serde::{Deserialize, Serialize};

use crate::camera::lens::{CameraLens, MIN_PIXELS_PER_UNIT};
use crate::foundation::math::{utils, yaw_of, yaw_rotation, Quat, Vec2, Vec3};
use crate::scene::{NodeId, SceneHost};

/// Guard against a zero tween time in the ratio division.
const MIN_TWEEN_TIME: f32 = 1e-6;

/// Deadzone scale applied when the fullscreen-deadzone flag is set
/// (covers ~100% of the screen while keeping a small margin).
const FULLSCREEN_DEADZONE: Vec2 = Vec2::new(0.9, 0.85);

/// Which reference frame the camera's rotation is blending toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReference {
    /// The configured default orientation
    World,
    /// The target's yaw-only orientation
    TargetLocked,
}

/// Tunables for the framing controller
///
/// Defaults follow a pixel-art side-scroller setup: a deadzone of half the
/// screen, a slight downward origin bias, and 64 pixels per world unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFramingConfig {
    /// Rotation used for the "world" orientation
    pub default_rotation: Quat,

    /// Deadzone size as a fraction of the frustum per axis
    pub deadzone: Vec2,

    /// Center offset of the deadzone as a fraction of the frustum
    pub origin: Vec2,

    /// Fixed camera height/depth on the Z axis
    pub camera_height: f32,

    /// Time in seconds to tween between rotation references
    pub tween_time: f32,

    /// Pixels per world unit on the sprite being followed
    pub pixels_per_unit: f32,

    /// Extra scale applied on top of `pixels_per_unit`
    pub pixel_scale: f32,

    /// Derive the orthographic size from the viewport so world units map to
    /// whole pixels
    pub autoset_orthographic_size: bool,

    /// Snap the camera position to the virtual pixel grid
    pub pixel_perfect_position: bool,

    /// Follow the target's yaw instead of holding the world orientation
    pub rotate_with_target: bool,

    /// Override the deadzone so it covers ~100% of the screen
    pub fullscreen_deadzone: bool,

    /// Keep the camera centered on the target at all times (zero deadzone)
    pub stay_on_target: bool,
}

impl Default for CameraFramingConfig {
    fn default() -> Self {
        Self {
            default_rotation: Quat::identity(),
            deadzone: Vec2::new(0.5, 0.5),
            origin: Vec2::new(0.0, -0.22),
            camera_height: -10.0,
            tween_time: 0.3,
            pixels_per_unit: 64.0,
            pixel_scale: 1.0,
            autoset_orthographic_size: true,
            pixel_perfect_position: false,
            rotate_with_target: true,
            fullscreen_deadzone: false,
            stay_on_target: false,
        }
    }
}

/// Per-frame controller keeping a target framed by the camera node
pub struct CameraFramingController {
    config: CameraFramingConfig,
    lens: CameraLens,
    camera: NodeId,
    target: Option<NodeId>,
    override_target: Option<NodeId>,
    rotation_reference: RotationReference,
    tween_origin: Quat,
    tween_target: Quat,
    tween_timer: f32,
}

impl CameraFramingController {
    /// Create a controller driving the given camera node
    pub fn new(camera: NodeId, lens: CameraLens, config: CameraFramingConfig) -> Self {
        Self {
            config,
            lens,
            camera,
            target: None,
            override_target: None,
            rotation_reference: RotationReference::World,
            tween_origin: Quat::identity(),
            tween_target: Quat::identity(),
            tween_timer: 0.0,
        }
    }

    /// The camera node this controller writes to
    pub fn camera(&self) -> NodeId {
        self.camera
    }

    /// The regular follow target
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Set the regular follow target
    pub fn set_target(&mut self, target: Option<NodeId>) {
        self.target = target;
    }

    /// The override target, if any (temporary camera hijacking)
    pub fn override_target(&self) -> Option<NodeId> {
        self.override_target
    }

    /// Set an override target the camera follows instead of the regular one
    pub fn set_override_target(&mut self, target: Option<NodeId>) {
        self.override_target = target;
    }

    /// The node the camera is currently following (override wins)
    pub fn camera_target(&self) -> Option<NodeId> {
        self.override_target.or(self.target)
    }

    /// The rotation reference the controller should be blending toward
    ///
    /// Target-locked whenever an override target is set or "rotate with
    /// target" is enabled; world otherwise.
    pub fn desired_rotation_reference(&self) -> RotationReference {
        if self.override_target.is_some() || self.config.rotate_with_target {
            RotationReference::TargetLocked
        } else {
            RotationReference::World
        }
    }

    /// The rotation reference currently in effect
    pub fn rotation_reference(&self) -> RotationReference {
        self.rotation_reference
    }

    /// Access the controller configuration
    pub fn config(&self) -> &CameraFramingConfig {
        &self.config
    }

    /// Mutably access the controller configuration
    pub fn config_mut(&mut self) -> &mut CameraFramingConfig {
        &mut self.config
    }

    /// Access the projection state
    pub fn lens(&self) -> &CameraLens {
        &self.lens
    }

    /// Mutably access the projection state (viewport feeding, resizes)
    pub fn lens_mut(&mut self) -> &mut CameraLens {
        &mut self.lens
    }

    /// Pixels per world unit with the pixel scale applied, floored away from
    /// zero
    pub fn effective_pixels_per_unit(&self) -> f32 {
        (self.config.pixels_per_unit * self.config.pixel_scale).max(MIN_PIXELS_PER_UNIT)
    }

    /// Advance the controller by one frame
    ///
    /// Reads the target transform, then writes the camera's position and
    /// rotation. No-op while no target is set.
    pub fn update(&mut self, scene: &dyn SceneHost, delta_time: f32) {
        if self.camera_target().is_none() {
            return;
        }

        self.update_position(scene);
        self.update_rotation(scene, delta_time);

        if self.config.autoset_orthographic_size {
            let pixels_per_unit = self.effective_pixels_per_unit();
            self.lens.autoset_orthographic_size(pixels_per_unit);
        }
    }

    /// The deadzone rectangle's corners, camera-local or world space
    ///
    /// Same order as [`CameraLens::frustum_corners`].
    pub fn deadzone_corners(&self, scene: &dyn SceneHost, world_space: bool) -> [Vec3; 4] {
        let mut corners = self.deadzone_corners_local();
        if world_space {
            if let Some(world) = scene.world_transform(self.camera) {
                for corner in &mut corners {
                    *corner = world.transform_point(*corner);
                }
            }
        }
        corners
    }

    fn deadzone_corners_local(&self) -> [Vec3; 4] {
        let mut corners = self.lens.frustum_corners();

        let mut deadzone = FULLSCREEN_DEADZONE;
        let mut origin = self.config.origin;
        if self.config.fullscreen_deadzone {
            origin = Vec2::zeros();
        } else {
            deadzone = self.config.deadzone;
        }
        if self.config.stay_on_target {
            deadzone = Vec2::zeros();
        }

        let shift = Vec2::new(
            corners[2].x * 2.0 * origin.x,
            corners[2].y * 2.0 * origin.y,
        );
        for corner in &mut corners {
            corner.x = corner.x * deadzone.x + shift.x;
            corner.y = corner.y * deadzone.y + shift.y;
        }
        corners
    }

    fn update_position(&mut self, scene: &dyn SceneHost) {
        let Some(target) = self.camera_target() else {
            return;
        };
        let Some(target_position) = scene.world_position(target) else {
            return;
        };

        let corners = self.deadzone_corners_local();
        let camera_rotation = scene
            .world_rotation(self.camera)
            .unwrap_or_else(Quat::identity);
        let camera_position = scene.world_position(self.camera).unwrap_or_else(Vec3::zeros);

        // How far the target sits from the camera center, in camera-local
        // space, then clamped into the deadzone bounds. Negative deadzone
        // sizes can swap the corner ordering; clamp handles either order.
        let mut offset = camera_rotation.inverse() * (target_position - camera_position);
        offset.x = clamp_between(offset.x, corners[0].x, corners[2].x);
        offset.y = clamp_between(offset.y, corners[0].y, corners[2].y);

        let mut position = target_position - camera_rotation * offset;
        position.z = self.config.camera_height;

        if self.config.pixel_perfect_position {
            let stride = 1.0_f64 / f64::from(self.effective_pixels_per_unit());
            position.x = snap_to_grid(position.x, stride);
            position.y = snap_to_grid(position.y, stride);
        }

        scene.set_world_position(self.camera, position);
    }

    fn update_rotation(&mut self, scene: &dyn SceneHost, delta_time: f32) {
        let Some(target) = self.camera_target() else {
            return;
        };
        let target_yaw = scene.world_rotation(target).map_or(0.0, |r| yaw_of(&r));

        let desired = self.desired_rotation_reference();
        if desired == self.rotation_reference {
            self.tween_timer = (self.tween_timer + delta_time).min(self.config.tween_time);
        } else {
            self.tween_timer = 0.0;
            self.rotation_reference = desired;
            self.tween_origin = match desired {
                // Leaving target lock: blend away from the target's yaw
                RotationReference::World => yaw_rotation(target_yaw),
                // Entering target lock: blend from wherever the camera is now
                // so the transition is not disorienting
                RotationReference::TargetLocked => scene
                    .world_rotation(self.camera)
                    .unwrap_or_else(Quat::identity),
            };
        }

        self.tween_target = match self.rotation_reference {
            RotationReference::TargetLocked => yaw_rotation(target_yaw),
            RotationReference::World => self.config.default_rotation,
        };

        let mut ratio = utils::clamp01(
            (self.tween_timer / self.config.tween_time.max(MIN_TWEEN_TIME)).abs(),
        );
        if ratio >= 0.99999 {
            ratio = 1.0;
        }

        // Exact endpoints; slerp only strictly inside the tween
        let rotation = if ratio <= 0.0 {
            self.tween_origin
        } else if ratio >= 1.0 {
            self.tween_target
        } else {
            self.tween_origin.slerp(&self.tween_target, ratio)
        };
        scene.set_world_rotation(self.camera, rotation);
    }
}

/// Clamp `value` between two bounds that may arrive in either order
fn clamp_between(value: f32, a: f32, b: f32) -> f32 {
    if a < b {
        utils::clamp(value, a, b)
    } else {
        utils::clamp(value, b, a)
    }
}

/// Round to the nearest multiple of `stride`, in f64 to keep the grid exact
/// for small strides
fn snap_to_grid(value: f32, stride: f64) -> f32 {
    (stride * (f64::from(value) / stride).round()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneTree;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    /// Square 100x100 viewport, orthographic size 5 (half extents 5x5),
    /// camera at the origin, no autosizing so the extents stay put.
    fn rig(config: CameraFramingConfig) -> (SceneTree, CameraFramingController, NodeId) {
        let scene = SceneTree::new();
        let camera = scene.create_node("camera");
        let target = scene.create_node("player");

        let mut lens = CameraLens::new(100.0, 100.0);
        lens.set_orthographic_size(5.0);

        let mut controller = CameraFramingController::new(camera, lens, config);
        controller.set_target(Some(target));
        (scene, controller, target)
    }

    fn flat_config() -> CameraFramingConfig {
        CameraFramingConfig {
            origin: Vec2::zeros(),
            camera_height: 0.0,
            rotate_with_target: false,
            autoset_orthographic_size: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_target_inside_deadzone_camera_stays() {
        let (scene, mut controller, target) = rig(flat_config());

        // Deadzone (0.5, 0.5) of half extents 5 -> x,y within [-2.5, 2.5]
        scene.set_world_position(target, Vec3::new(1.0, -2.0, 0.0));
        controller.update(&scene, 0.016);

        let camera_position = scene.world_position(controller.camera()).unwrap();
        assert_relative_eq!(camera_position, Vec3::zeros(), epsilon = EPSILON);
    }

    #[test]
    fn test_target_beyond_corner_lands_exactly_on_corner() {
        let (scene, mut controller, target) = rig(flat_config());

        scene.set_world_position(target, Vec3::new(10.0, -7.0, 0.0));
        controller.update(&scene, 0.016);

        let camera_position = scene.world_position(controller.camera()).unwrap();
        assert_relative_eq!(camera_position.x, 7.5, epsilon = EPSILON);
        assert_relative_eq!(camera_position.y, -4.5, epsilon = EPSILON);

        // The target now sits exactly on the deadzone corner
        let corners = controller.deadzone_corners(&scene, false);
        let target_position = scene.world_position(target).unwrap();
        assert_relative_eq!(target_position.x - camera_position.x, corners[2].x, epsilon = EPSILON);
        assert_relative_eq!(target_position.y - camera_position.y, corners[0].y, epsilon = EPSILON);
    }

    #[test]
    fn test_stay_on_target_applies_origin_bias() {
        let mut config = flat_config();
        config.stay_on_target = true;
        config.origin = Vec2::new(0.0, -0.22);
        let (scene, mut controller, target) = rig(config);

        scene.set_world_position(target, Vec3::new(3.0, 0.0, 0.0));
        controller.update(&scene, 0.016);

        // Zero deadzone pins the target to the biased center: the camera
        // sits above it by |shift| = 5 * 2 * 0.22
        let camera_position = scene.world_position(controller.camera()).unwrap();
        assert_relative_eq!(camera_position.x, 3.0, epsilon = EPSILON);
        assert_relative_eq!(camera_position.y, 2.2, epsilon = EPSILON);
    }

    #[test]
    fn test_fullscreen_deadzone_overrides_size_and_origin() {
        let mut config = flat_config();
        config.fullscreen_deadzone = true;
        config.origin = Vec2::new(0.3, 0.3);
        let (scene, controller, _target) = rig(config);

        let corners = controller.deadzone_corners(&scene, false);
        assert_relative_eq!(corners[2].x, 4.5, epsilon = EPSILON);
        assert_relative_eq!(corners[2].y, 4.25, epsilon = EPSILON);
        // Origin bias is suppressed
        assert_relative_eq!(corners[0].x, -4.5, epsilon = EPSILON);
        assert_relative_eq!(corners[0].y, -4.25, epsilon = EPSILON);
    }

    #[test]
    fn test_pixel_perfect_position_snaps_to_grid() {
        let mut config = flat_config();
        config.stay_on_target = true;
        config.pixel_perfect_position = true;
        let (scene, mut controller, target) = rig(config);

        // Stride is 1/64; 1.007 is within half a pixel of exactly 1.0
        scene.set_world_position(target, Vec3::new(1.007, 2.0, 0.0));
        controller.update(&scene, 0.016);

        let camera_position = scene.world_position(controller.camera()).unwrap();
        assert_relative_eq!(camera_position.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera_position.y, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tween_starts_at_origin_and_ends_exactly_on_target() {
        let mut config = flat_config();
        config.rotate_with_target = true;
        config.tween_time = 0.3;
        let (scene, mut controller, target) = rig(config);

        scene.set_world_rotation(target, yaw_rotation(FRAC_PI_2));

        // First frame: mode transition, timer 0 -> camera holds its origin
        controller.update(&scene, 0.1);
        assert_eq!(controller.rotation_reference(), RotationReference::TargetLocked);
        let rotation = scene.world_rotation(controller.camera()).unwrap();
        assert_relative_eq!(rotation, Quat::identity(), epsilon = EPSILON);

        // Progress toward the target yaw is monotonic
        let locked_yaw = yaw_rotation(FRAC_PI_2);
        let mut previous_angle = rotation.angle_to(&locked_yaw);
        for _ in 0..2 {
            controller.update(&scene, 0.1);
            let rotation = scene.world_rotation(controller.camera()).unwrap();
            let angle = rotation.angle_to(&locked_yaw);
            assert!(angle < previous_angle, "tween did not progress");
            previous_angle = angle;
        }

        // Timer saturated: exactly on target, no residual slerp error
        controller.update(&scene, 0.1);
        let rotation = scene.world_rotation(controller.camera()).unwrap();
        assert_relative_eq!(rotation, locked_yaw, epsilon = 1e-6);
    }

    #[test]
    fn test_disabling_rotate_with_target_triggers_one_transition() {
        let mut config = flat_config();
        config.rotate_with_target = true;
        config.tween_time = 0.2;
        let (scene, mut controller, target) = rig(config);

        scene.set_world_rotation(target, yaw_rotation(1.0));

        // Settle into target lock
        for _ in 0..5 {
            controller.update(&scene, 0.1);
        }
        assert_eq!(controller.rotation_reference(), RotationReference::TargetLocked);

        controller.config_mut().rotate_with_target = false;

        let mut transitions = 0;
        let mut reference = controller.rotation_reference();
        for _ in 0..6 {
            controller.update(&scene, 0.1);
            if controller.rotation_reference() != reference {
                transitions += 1;
                reference = controller.rotation_reference();
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(reference, RotationReference::World);

        // Full tween cycle back to the world orientation
        let rotation = scene.world_rotation(controller.camera()).unwrap();
        assert_relative_eq!(rotation, Quat::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_override_target_forces_target_lock() {
        let mut config = flat_config();
        config.rotate_with_target = false;
        let (scene, mut controller, _target) = rig(config);

        assert_eq!(controller.desired_rotation_reference(), RotationReference::World);

        let hijacker = scene.create_node("cutscene");
        controller.set_override_target(Some(hijacker));
        assert_eq!(controller.camera_target(), Some(hijacker));
        assert_eq!(
            controller.desired_rotation_reference(),
            RotationReference::TargetLocked
        );

        controller.set_override_target(None);
        assert_eq!(controller.desired_rotation_reference(), RotationReference::World);
    }

    #[test]
    fn test_update_without_target_is_a_noop() {
        let mut config = flat_config();
        config.rotate_with_target = true;
        let (scene, mut controller, _target) = rig(config);
        controller.set_target(None);

        controller.update(&scene, 0.1);
        let camera_position = scene.world_position(controller.camera()).unwrap();
        assert_relative_eq!(camera_position, Vec3::zeros(), epsilon = EPSILON);
        assert_eq!(controller.rotation_reference(), RotationReference::World);
    }
}
