//! Render queue construction
//!
//! The queue is a permutation of the frame's renderable items ordered by
//! (render layer, shader, material). Sorting by shader then material lets the
//! geometry pass skip redundant pipeline and material binds; sorting by layer
//! first keeps the skybox (layer 100) after opaque geometry (layer 0).

use crate::resources::{MaterialId, MeshId, ShaderId};
use bevy_ecs::entity::Entity;
use glam::Mat4;

/// One draw gathered from the scene, valid for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderableItem {
    pub entity: Entity,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub shader: ShaderId,
    pub render_layer: i32,
    pub world: Mat4,
    pub cast_shadows: bool,
}

impl RenderableItem {
    pub fn sort_key(&self) -> (i32, ShaderId, MaterialId) {
        (self.render_layer, self.shader, self.material)
    }
}

/// Items in submission order
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    items: Vec<RenderableItem>,
    order: Vec<usize>,
}

impl RenderQueue {
    /// Items in draw order
    pub fn iter(&self) -> impl Iterator<Item = &RenderableItem> + '_ {
        self.order.iter().map(move |&i| &self.items[i])
    }

    /// Items in draw order paired with their draw slot
    pub fn slots(&self) -> impl Iterator<Item = (usize, &RenderableItem)> + '_ {
        self.iter().enumerate()
    }

    /// Indices into the original item list, in draw order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items that cast shadows
    pub fn shadow_caster_count(&self) -> usize {
        self.items.iter().filter(|i| i.cast_shadows).count()
    }
}

/// Build the frame's render queue; the input is left untouched
pub fn build_render_queue(items: &[RenderableItem]) -> RenderQueue {
    let mut order: Vec<usize> = (0..items.len()).collect();
    // Stable: equal keys keep scene order
    order.sort_by_key(|&i| items[i].sort_key());

    RenderQueue {
        items: items.to_vec(),
        order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: u32, layer: i32, shader: u32, material: u32) -> RenderableItem {
        RenderableItem {
            entity: Entity::from_raw(index),
            mesh: MeshId(0),
            material: MaterialId(material),
            shader: ShaderId(shader),
            render_layer: layer,
            world: Mat4::IDENTITY,
            cast_shadows: true,
        }
    }

    #[test]
    fn test_sorted_by_layer_shader_material() {
        let items = vec![
            item(0, 0, 1, 2),
            item(1, 100, 0, 0),
            item(2, 0, 0, 5),
            item(3, 0, 1, 1),
            item(4, 0, 0, 3),
        ];
        let queue = build_render_queue(&items);
        let keys: Vec<_> = queue.iter().map(|i| i.sort_key()).collect();

        assert_eq!(queue.order(), &[4, 2, 3, 0, 1]);
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_equal_keys_keep_input_order() {
        let items: Vec<_> = (0..6).map(|i| item(i, 0, 0, 0)).collect();
        let queue = build_render_queue(&items);
        assert_eq!(queue.order(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_queue() {
        let queue = build_render_queue(&[]);
        assert!(queue.is_empty());
        assert_eq!(queue.iter().count(), 0);
    }
}
