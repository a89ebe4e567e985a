//! Transform components

use crate::backend::types::ObjectUniform;
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// Local transform relative to the parent, or to the world without one
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_scale(position: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            scale,
            ..Default::default()
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

    /// Local model matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotate around an axis, applied after the current rotation
    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        let delta = Quat::from_axis_angle(axis.normalize_or_zero(), angle);
        self.rotation = (delta * self.rotation).normalize();
    }
}

/// Parent entity; the world matrix composes the parent's world matrix
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// World matrix resolved once per frame by `Scene::update_world_matrices`
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct WorldMatrix(pub Mat4);

impl Default for WorldMatrix {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

impl WorldMatrix {
    /// Object uniform for this matrix
    pub fn uniform(&self) -> ObjectUniform {
        ObjectUniform {
            model: self.0,
            normal_matrix: self.0.inverse().transpose(),
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale_keeps_direction() {
        let world = WorldMatrix(Mat4::from_scale(Vec3::splat(3.0)));
        let n = world.uniform().normal_matrix.transform_vector3(Vec3::Z).normalize();
        assert!((n - Vec3::Z).length() < 1e-5);
    }
}
