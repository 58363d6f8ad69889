use serde::{Deserialize, Serialize};

use crate::types::Millis;

use super::{error::WireError, record::require_finite};

/// Position, rotation and velocity of an entity at one instant.
///
/// A value type: updates produce new transforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkTransform {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub vel_z: f32,
    pub timestamp: Millis,
}

impl NetworkTransform {
    pub fn at_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rot_x: f32, rot_y: f32, rot_z: f32) -> Self {
        self.rot_x = rot_x;
        self.rot_y = rot_y;
        self.rot_z = rot_z;
        self
    }

    pub fn with_velocity(mut self, vel_x: f32, vel_y: f32, vel_z: f32) -> Self {
        self.vel_x = vel_x;
        self.vel_y = vel_y;
        self.vel_z = vel_z;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Millis) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn position(&self) -> (f32, f32, f32) {
        (self.x, self.y, self.z)
    }

    /// Linear blend towards `other`. `t` is clamped to `[0, 1]`, and the
    /// endpoints return the corresponding input unchanged.
    pub fn lerp(&self, other: &NetworkTransform, t: f32) -> NetworkTransform {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }

        let blend = |a: f32, b: f32| a * (1.0 - t) + b * t;
        let span = (other.timestamp - self.timestamp) as f64;
        NetworkTransform {
            x: blend(self.x, other.x),
            y: blend(self.y, other.y),
            z: blend(self.z, other.z),
            rot_x: blend(self.rot_x, other.rot_x),
            rot_y: blend(self.rot_y, other.rot_y),
            rot_z: blend(self.rot_z, other.rot_z),
            vel_x: blend(self.vel_x, other.vel_x),
            vel_y: blend(self.vel_y, other.vel_y),
            vel_z: blend(self.vel_z, other.vel_z),
            timestamp: self.timestamp + (span * f64::from(t)).round() as Millis,
        }
    }

    pub fn validate(&self) -> Result<(), WireError> {
        require_finite("x", self.x)?;
        require_finite("y", self.y)?;
        require_finite("z", self.z)?;
        require_finite("rotX", self.rot_x)?;
        require_finite("rotY", self.rot_y)?;
        require_finite("rotZ", self.rot_z)?;
        require_finite("velX", self.vel_x)?;
        require_finite("velY", self.vel_y)?;
        require_finite("velZ", self.vel_z)?;
        Ok(())
    }
}
