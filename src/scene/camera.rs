//! Camera system

use glam::{Mat4, Vec3};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        near: f32,
        far: f32,
    },
    /// Symmetric box `height` units tall, width following the aspect
    Orthographic {
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            near,
            far,
        }
    }

    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic { height, near, far }
    }

    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Projection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Projection::Orthographic { height, near, far } => {
                let half_h = height / 2.0;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self, Projection::Orthographic { .. })
    }
}

/// Camera for viewing the scene, Z up
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub perspective: Projection,
    pub orthographic: Projection,
    orthographic_active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(3.0, 3.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            aspect: 16.0 / 9.0,
            perspective: Projection::perspective(90.0, 0.1, 100.0),
            orthographic: Projection::orthographic(3.0, -100.0, 100.0),
            orthographic_active: false,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    /// Switch between the perspective and orthographic projections
    pub fn toggle_ortho(&mut self) {
        self.orthographic_active = !self.orthographic_active;
        log::debug!(
            "Camera projection: {}",
            if self.orthographic_active { "orthographic" } else { "perspective" }
        );
    }

    pub fn is_orthographic(&self) -> bool {
        self.orthographic_active
    }

    pub fn projection(&self) -> &Projection {
        if self.orthographic_active {
            &self.orthographic
        } else {
            &self.perspective
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection().matrix(self.aspect)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World position recovered from the view matrix
    pub fn world_position(&self) -> Vec3 {
        self.view_matrix().inverse().w_axis.truncate()
    }

    /// Update aspect ratio from a surface size
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_position_matches_view() {
        let camera = Camera::default();
        assert!((camera.world_position() - Vec3::new(3.0, 3.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn test_toggle_ortho() {
        let mut camera = Camera::default();
        let perspective = camera.projection_matrix();
        camera.toggle_ortho();
        assert!(camera.is_orthographic());
        assert_ne!(camera.projection_matrix(), perspective);
        camera.toggle_ortho();
        assert_eq!(camera.projection_matrix(), perspective);
    }

    #[test]
    fn test_target_projects_to_center() {
        let mut camera = Camera::default();
        camera.set_aspect(800.0, 600.0);
        let clip = camera.view_projection_matrix() * camera.target.extend(1.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
    }
}
