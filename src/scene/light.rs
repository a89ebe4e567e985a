//! Directional light and the light-space transform derived from it

use crate::ShadowConfig;
use bevy_ecs::prelude::*;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Directional light component
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in; need not be normalized
    pub direction: Vec3,
    pub color: Vec3,
    /// Fraction of albedo visible without direct light
    pub ambient_power: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-1.0, -1.0, -1.0),
            color: Vec3::ONE,
            ambient_power: 0.3,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3) -> Self {
        Self {
            direction,
            color,
            ..Default::default()
        }
    }
}

/// Direction used for a light whose direction is zero or not finite
pub const FALLBACK_LIGHT_DIRECTION: Vec3 = Vec3::NEG_Z;

/// Normalized light direction, straight down when `direction` has no length
pub fn normalized_light_direction(direction: Vec3) -> Vec3 {
    direction.try_normalize().unwrap_or(FALLBACK_LIGHT_DIRECTION)
}

/// View-projection of the shadow camera looking along `direction` at the origin
///
/// The up vector is +Z unless the light is (nearly) vertical, in which case
/// +Y is used instead.
pub fn light_space_matrix(direction: Vec3, config: &ShadowConfig) -> Mat4 {
    let dir = normalized_light_direction(direction);
    let up = if dir.dot(Vec3::Z).abs() > 0.999 { Vec3::Y } else { Vec3::Z };

    let h = config.half_extent;
    let projection = Mat4::orthographic_rh(-h, h, -h, h, config.near, config.far);
    let view = Mat4::look_at_rh(-dir, Vec3::ZERO, up);
    projection * view
}

/// Recover the normalized light direction from a light-space matrix
pub fn light_direction_from_matrix(light_space: Mat4) -> Vec3 {
    (light_space.inverse() * Vec4::new(0.0, 0.0, 1.0, 0.0))
        .truncate()
        .normalize()
}

/// Per-frame light state shared by the shadow and lighting passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient_power: f32,
    pub light_space: Mat4,
    pub camera_position: Vec3,
}

impl LightState {
    /// Computed once per frame, before any pass runs
    pub fn compute(light: &DirectionalLight, camera_view: Mat4, config: &ShadowConfig) -> Self {
        Self {
            direction: normalized_light_direction(light.direction),
            color: light.color,
            ambient_power: light.ambient_power,
            light_space: light_space_matrix(light.direction, config),
            camera_position: camera_view.inverse().w_axis.truncate(),
        }
    }

    pub fn uniform(&self) -> LightUniform {
        LightUniform {
            direction: self.direction.extend(0.0),
            color: self.color.extend(self.ambient_power),
            light_space: self.light_space,
            camera_position: self.camera_position.extend(1.0),
        }
    }
}

/// Lighting pass uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightUniform {
    pub direction: Vec4,
    /// rgb colour, w ambient power
    pub color: Vec4,
    pub light_space: Mat4,
    pub camera_position: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_round_trip() {
        let config = ShadowConfig::default();
        for direction in [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(0.3, -2.0, -0.5),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(5.0, 0.0, 0.0),
        ] {
            let m = light_space_matrix(direction, &config);
            let recovered = light_direction_from_matrix(m);
            assert!((recovered - direction.normalize()).length() < 1e-4, "{direction:?}");
        }
    }

    #[test]
    fn test_zero_direction_matches_shadow_matrix() {
        let light = DirectionalLight::new(Vec3::ZERO, Vec3::ONE);
        let state = LightState::compute(&light, Mat4::IDENTITY, &ShadowConfig::default());

        assert_eq!(state.direction, FALLBACK_LIGHT_DIRECTION);
        let recovered = light_direction_from_matrix(state.light_space);
        assert!((recovered - state.direction).length() < 1e-4);
        assert!(state.uniform().light_space.is_finite());
    }

    #[test]
    fn test_origin_inside_shadow_frustum() {
        let config = ShadowConfig::default();
        let m = light_space_matrix(Vec3::new(-1.0, -1.0, -1.0), &config);
        let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5);
        let expected = (3.0f32.sqrt() + 30.0) / 60.0;
        assert!((p.z - expected).abs() < 1e-5);
    }

    #[test]
    fn test_camera_position_from_view() {
        let view = Mat4::look_at_rh(Vec3::new(3.0, 3.0, 3.0), Vec3::ZERO, Vec3::Z);
        let state = LightState::compute(&DirectionalLight::default(), view, &ShadowConfig::default());
        assert!((state.camera_position - Vec3::new(3.0, 3.0, 3.0)).length() < 1e-4);
        assert_eq!(state.uniform().color.w, 0.3);
    }
}
