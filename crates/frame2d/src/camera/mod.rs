//! Camera framing - deadzone following and rotation-reference blending
//!
//! [`CameraFramingController`] is a per-frame control loop that keeps a
//! moving target inside a configurable on-screen deadzone and blends the
//! camera between a fixed "world" orientation and a "target-locked"
//! orientation. [`CameraLens`] carries the orthographic projection state the
//! deadzone is derived from.

pub mod controller;
pub mod lens;

pub use controller::{CameraFramingConfig, CameraFramingController, RotationReference};
pub use lens::CameraLens;
