//! Transform component

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

use super::NodeId;

/// World placement of an entity
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// At `position`, facing `target` with +Y up
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut transform = Self::from_position(position);
        transform.look_at(target, Vec3::Y);
        transform
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local -Z in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);
        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));
    }
}

/// Links an entity to the render node its [`Transform`] is written to
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneNode(pub NodeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_points_forward_at_target() {
        let transform = Transform::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::new(5.0, 0.0, 5.0));
        assert!(transform.forward().abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn matrix_applies_scale_before_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 0.0, 0.0)).with_scale(Vec3::splat(2.0));
        let point = transform.matrix().transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(point.abs_diff_eq(Vec3::new(3.0, 2.0, 0.0), 1e-6));
    }
}
