//! Scene management
//!
//! Entities live in a bevy_ecs [`World`]. Renderable entities carry a
//! [`Transform`], a [`WorldMatrix`] and a [`MeshRenderer`]; the single
//! directional light is an entity with a [`DirectionalLight`].

mod behaviour;
mod camera;
mod light;
mod transform;

pub use behaviour::*;
pub use camera::*;
pub use light::*;
pub use transform::*;

use crate::render_queue::RenderableItem;
use crate::resources::{MaterialId, MaterialRegistry, MeshId};
use crate::time::FrameTime;
use bevy_ecs::prelude::*;
use glam::Mat4;
use std::collections::HashMap;

/// Deepest parent chain resolved; longer chains are treated as cycles
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Mesh and material drawn for an entity
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct MeshRenderer {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub cast_shadows: bool,
}

impl MeshRenderer {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            mesh,
            material,
            cast_shadows: true,
        }
    }

    pub fn without_shadows(mut self) -> Self {
        self.cast_shadows = false;
        self
    }
}

/// The scene containing all renderable content
pub struct Scene {
    pub world: World,
    pub camera: Camera,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            camera: Camera::default(),
        }
    }

    /// Spawn a renderable entity
    pub fn spawn_object(&mut self, transform: Transform, renderer: MeshRenderer) -> Entity {
        self.world
            .spawn((transform, WorldMatrix(transform.matrix()), renderer))
            .id()
    }

    /// Spawn the directional light
    pub fn spawn_light(&mut self, light: DirectionalLight) -> Entity {
        if self.light().is_some() {
            log::warn!("Scene already has a directional light, only the first is used");
        }
        self.world.spawn(light).id()
    }

    /// Attach behaviours to an entity, replacing any it had
    pub fn add_behaviours(&mut self, entity: Entity, behaviours: Behaviours) {
        if self.world.entities().contains(entity) {
            self.world.entity_mut(entity).insert(behaviours);
        }
    }

    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        if self.world.entities().contains(child) {
            self.world.entity_mut(child).insert(Parent(parent));
        }
    }

    /// The directional light, if the scene has one
    pub fn light(&self) -> Option<DirectionalLight> {
        self.world
            .iter_entities()
            .find_map(|e| e.get::<DirectionalLight>().copied())
    }

    pub fn light_mut(&mut self) -> Option<Mut<'_, DirectionalLight>> {
        let entity = self
            .world
            .iter_entities()
            .find(|e| e.contains::<DirectionalLight>())
            .map(|e| e.id())?;
        self.world.get_mut::<DirectionalLight>(entity)
    }

    /// Run every entity's behaviours for this frame
    pub fn update_behaviours(&mut self, time: &FrameTime) {
        let mut query = self.world.query::<(&mut Behaviours, &mut Transform)>();
        for (mut behaviours, mut transform) in query.iter_mut(&mut self.world) {
            behaviours.update(&mut transform, time);
        }
    }

    /// Resolve every entity's world matrix from its transform and parents
    pub fn update_world_matrices(&mut self) {
        let mut query = self
            .world
            .query::<(Entity, &Transform, Option<&Parent>)>();
        let locals: HashMap<Entity, (Mat4, Option<Entity>)> = query
            .iter(&self.world)
            .map(|(entity, transform, parent)| (entity, (transform.matrix(), parent.map(|p| p.0))))
            .collect();

        let mut resolved: HashMap<Entity, Mat4> = HashMap::with_capacity(locals.len());
        for &entity in locals.keys() {
            let mut matrix = Mat4::IDENTITY;
            let mut current = Some(entity);
            let mut depth = 0;
            while let Some(e) = current {
                let Some((local, parent)) = locals.get(&e) else {
                    break;
                };
                matrix = *local * matrix;
                current = *parent;
                depth += 1;
                if depth > MAX_HIERARCHY_DEPTH {
                    log::warn!("Parent chain of {:?} is too deep or cyclic", entity);
                    break;
                }
            }
            resolved.insert(entity, matrix);
        }

        let mut query = self.world.query::<(Entity, &mut WorldMatrix)>();
        for (entity, mut world_matrix) in query.iter_mut(&mut self.world) {
            if let Some(matrix) = resolved.get(&entity) {
                world_matrix.0 = *matrix;
            }
        }
    }

    /// Gather this frame's renderable items
    pub fn collect_renderables(&mut self, materials: &MaterialRegistry) -> Vec<RenderableItem> {
        let mut query = self
            .world
            .query::<(Entity, &MeshRenderer, &WorldMatrix)>();
        query
            .iter(&self.world)
            .filter_map(|(entity, renderer, world)| {
                let Some(material) = materials.get(renderer.material) else {
                    log::warn!("{:?} references unknown material {:?}", entity, renderer.material);
                    return None;
                };
                Some(RenderableItem {
                    entity,
                    mesh: renderer.mesh,
                    material: renderer.material,
                    shader: material.shader,
                    render_layer: material.render_layer,
                    world: world.0,
                    cast_shadows: renderer.cast_shadows,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ShaderId, LAYER_SKYBOX};
    use glam::Vec3;

    #[test]
    fn test_parent_matrices_compose() {
        let mut scene = Scene::new();
        let renderer = MeshRenderer::new(MeshId(0), MaterialId(0));
        let parent = scene.spawn_object(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)), renderer);
        let child = scene.spawn_object(Transform::from_position(Vec3::new(0.0, 2.0, 0.0)), renderer);
        scene.set_parent(child, parent);

        scene.update_world_matrices();

        let world = scene.world.get::<WorldMatrix>(child).unwrap();
        assert!((world.translation() - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_collect_uses_material_layer_and_shader() {
        let mut materials = MaterialRegistry::new();
        let sky = materials.create("sky", ShaderId(3), LAYER_SKYBOX);

        let mut scene = Scene::new();
        scene.spawn_object(Transform::default(), MeshRenderer::new(MeshId(1), sky).without_shadows());
        scene.spawn_object(Transform::default(), MeshRenderer::new(MeshId(1), MaterialId(9)));

        let items = scene.collect_renderables(&materials);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].shader, ShaderId(3));
        assert_eq!(items[0].render_layer, LAYER_SKYBOX);
        assert!(!items[0].cast_shadows);
    }

    #[test]
    fn test_light_mut_edits_the_light() {
        let mut scene = Scene::new();
        assert!(scene.light().is_none());
        scene.spawn_light(DirectionalLight::default());

        scene.light_mut().unwrap().direction = Vec3::new(0.0, 0.0, -1.0);
        assert_eq!(scene.light().unwrap().direction, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_behaviours_move_entities() {
        let mut scene = Scene::new();
        let e = scene.spawn_object(Transform::default(), MeshRenderer::new(MeshId(0), MaterialId(0)));
        scene.add_behaviours(e, Behaviours::new().with(Behaviour::follow_path(vec![Vec3::ZERO, Vec3::Z], 1.0)));

        scene.update_behaviours(&FrameTime::new(0.25, 0.25));
        scene.update_world_matrices();

        let world = scene.world.get::<WorldMatrix>(e).unwrap();
        assert!((world.translation() - Vec3::new(0.0, 0.0, 0.25)).length() < 1e-6);
    }
}
