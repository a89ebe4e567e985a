//! Per-entity behaviours
//!
//! A [`Behaviours`] component holds an ordered list of behaviour slots. Each
//! frame every enabled slot updates the entity's [`Transform`] in insertion
//! order, using the explicit [`FrameTime`].

use crate::scene::transform::Transform;
use crate::time::FrameTime;
use bevy_ecs::prelude::*;
use glam::Vec3;

/// The kinds of behaviour an entity may carry
#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    /// Spin around `axis` at a constant rate
    Rotate { axis: Vec3, degrees_per_second: f32 },
    /// Travel back and forth along `points` at `speed` units per second
    FollowPath(FollowPath),
}

impl Behaviour {
    pub fn rotate(axis: Vec3, degrees_per_second: f32) -> Self {
        Behaviour::Rotate {
            axis,
            degrees_per_second,
        }
    }

    pub fn follow_path(points: Vec<Vec3>, speed: f32) -> Self {
        Behaviour::FollowPath(FollowPath::new(points, speed))
    }

    fn update(&mut self, transform: &mut Transform, time: &FrameTime) {
        match self {
            Behaviour::Rotate {
                axis,
                degrees_per_second,
            } => {
                transform.rotate_axis(*axis, (*degrees_per_second * time.delta).to_radians());
            }
            Behaviour::FollowPath(path) => {
                if let Some(position) = path.advance(time.delta) {
                    transform.position = position;
                }
            }
        }
    }
}

/// Ping-pong path state
#[derive(Debug, Clone, PartialEq)]
pub struct FollowPath {
    pub points: Vec<Vec3>,
    pub speed: f32,
    segment: usize,
    progress: f32,
    forward: bool,
}

impl FollowPath {
    pub fn new(points: Vec<Vec3>, speed: f32) -> Self {
        Self {
            points,
            speed,
            segment: 0,
            progress: 0.0,
            forward: true,
        }
    }

    /// Move `delta` seconds along the path and return the new position
    pub fn advance(&mut self, delta: f32) -> Option<Vec3> {
        match self.points.len() {
            0 => return None,
            1 => return Some(self.points[0]),
            _ => {}
        }

        let mut distance = (self.speed * delta).max(0.0);
        // Bounded so a zero-length segment cannot spin forever
        for _ in 0..self.points.len() * 4 {
            let (from, to) = self.endpoints();
            let length = from.distance(to);
            let remaining = length * (1.0 - self.progress);
            if length <= f32::EPSILON || distance >= remaining {
                distance -= remaining.max(0.0);
                self.next_segment();
                if distance <= 0.0 {
                    break;
                }
            } else {
                self.progress += distance / length;
                break;
            }
        }

        let (from, to) = self.endpoints();
        Some(from.lerp(to, self.progress))
    }

    fn endpoints(&self) -> (Vec3, Vec3) {
        let a = self.points[self.segment];
        let b = self.points[self.segment + 1];
        if self.forward {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn next_segment(&mut self) {
        self.progress = 0.0;
        let last = self.points.len() - 2;
        if self.forward {
            if self.segment == last {
                self.forward = false;
            } else {
                self.segment += 1;
            }
        } else if self.segment == 0 {
            self.forward = true;
        } else {
            self.segment -= 1;
        }
    }
}

/// One behaviour plus its enabled flag
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviourSlot {
    pub enabled: bool,
    pub behaviour: Behaviour,
}

/// Ordered behaviours attached to an entity
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Behaviours(pub Vec<BehaviourSlot>);

impl Behaviours {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, behaviour: Behaviour) -> Self {
        self.push(behaviour);
        self
    }

    pub fn push(&mut self, behaviour: Behaviour) {
        self.0.push(BehaviourSlot {
            enabled: true,
            behaviour,
        });
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(slot) = self.0.get_mut(index) {
            slot.enabled = enabled;
        }
    }

    /// Run every enabled behaviour in insertion order
    pub fn update(&mut self, transform: &mut Transform, time: &FrameTime) {
        for slot in self.0.iter_mut().filter(|s| s.enabled) {
            slot.behaviour.update(transform, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_rotate_uses_delta() {
        let mut transform = Transform::default();
        let mut behaviours = Behaviours::new().with(Behaviour::rotate(Vec3::Z, 90.0));
        behaviours.update(&mut transform, &FrameTime::new(0.5, 0.5));

        let expected = Quat::from_rotation_z(45f32.to_radians());
        assert!(transform.rotation.angle_between(expected) < 1e-4);
    }

    #[test]
    fn test_follow_path_ping_pongs() {
        let mut path = FollowPath::new(vec![Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, 4.0)], 0.6);

        let p = path.advance(1.0).unwrap();
        assert!((p.z - 3.6).abs() < 1e-5);

        // 0.4 to the end, then 0.2 back
        let p = path.advance(1.0).unwrap();
        assert!((p.z - 3.8).abs() < 1e-5);
    }

    #[test]
    fn test_disabled_slot_is_skipped() {
        let mut transform = Transform::default();
        let mut behaviours = Behaviours::new()
            .with(Behaviour::follow_path(vec![Vec3::ZERO, Vec3::X], 1.0))
            .with(Behaviour::rotate(Vec3::Z, 90.0));
        behaviours.set_enabled(1, false);
        behaviours.update(&mut transform, &FrameTime::new(0.5, 0.5));

        assert!((transform.position - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(transform.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_degenerate_paths() {
        assert_eq!(FollowPath::new(vec![], 1.0).advance(1.0), None);
        assert_eq!(FollowPath::new(vec![Vec3::ONE], 1.0).advance(1.0), Some(Vec3::ONE));
        let mut same = FollowPath::new(vec![Vec3::ONE, Vec3::ONE], 1.0);
        assert_eq!(same.advance(1.0), Some(Vec3::ONE));
    }
}
