//! Materials: a shader plus named uniform and texture values

use crate::resources::shader::{Shader, ShaderId, MAX_MATERIAL_UNIFORMS};
use crate::resources::texture::TextureId;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Render layer of ordinary opaque geometry
pub const LAYER_OPAQUE: i32 = 0;
/// Render layer of the skybox, drawn after everything opaque
pub const LAYER_SKYBOX: i32 = 100;

/// Stable material identity, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// A value bound to one of the shader's material names
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Texture(TextureId),
}

impl MaterialValue {
    fn as_vec4(&self) -> Option<Vec4> {
        match *self {
            MaterialValue::Float(v) => Some(Vec4::new(v, 0.0, 0.0, 0.0)),
            MaterialValue::Vec2(v) => Some(v.extend(0.0).extend(0.0)),
            MaterialValue::Vec3(v) => Some(v.extend(0.0)),
            MaterialValue::Vec4(v) => Some(v),
            MaterialValue::Texture(_) => None,
        }
    }
}

/// Material uniform block as laid out on the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub values: [Vec4; MAX_MATERIAL_UNIFORMS],
}

/// Material definition
#[derive(Debug, Clone)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub shader: ShaderId,
    pub render_layer: i32,
    values: Vec<(String, MaterialValue)>,
    dirty: bool,
}

impl Material {
    /// Set a named value, replacing any earlier value of that name
    pub fn set(&mut self, name: &str, value: MaterialValue) {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name.to_string(), value)),
        }
        self.dirty = true;
    }

    pub fn with(mut self, name: &str, value: MaterialValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<MaterialValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Values in the order they were first set
    pub fn values(&self) -> &[(String, MaterialValue)] {
        &self.values
    }

    /// Whether the GPU copy needs refreshing
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Pack uniform values into the shader's slot order; unset slots are zero
    pub fn pack_uniforms(&self, shader: &Shader) -> MaterialUniform {
        let mut uniform = MaterialUniform::zeroed();
        for (slot, name) in shader.uniform_names.iter().enumerate() {
            if let Some(v) = self.get(name).and_then(|v| v.as_vec4()) {
                uniform.values[slot] = v;
            }
        }
        uniform
    }

    /// Textures in the shader's binding order; `None` falls back to white
    pub fn textures(&self, shader: &Shader) -> Vec<Option<TextureId>> {
        shader
            .texture_names
            .iter()
            .map(|name| match self.get(name) {
                Some(MaterialValue::Texture(id)) => Some(id),
                _ => None,
            })
            .collect()
    }
}

/// Registry handing out monotonically increasing material ids
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: Vec<Material>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty material for a shader
    pub fn create(&mut self, name: &str, shader: ShaderId, render_layer: i32) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(Material {
            id,
            name: name.to_string(),
            shader,
            render_layer,
            values: Vec::new(),
            dirty: true,
        });
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::shader::ShaderRegistry;

    #[test]
    fn test_pack_follows_shader_order() {
        let mut shaders = ShaderRegistry::new();
        let shader_id = shaders.register_standard().unwrap();
        let shader = shaders.get(shader_id).unwrap();

        let mut materials = MaterialRegistry::new();
        let id = materials.create("lego", shader_id, LAYER_OPAQUE);
        let material = materials.get_mut(id).unwrap();
        material.set("texture_mix", MaterialValue::Float(0.25));
        material.set("shininess", MaterialValue::Float(8.0));
        material.set("unknown", MaterialValue::Float(3.0));

        let packed = material.pack_uniforms(shader);
        assert_eq!(packed.values[0].x, 8.0);
        assert_eq!(packed.values[1].x, 0.25);
        assert_eq!(packed.values[2], Vec4::ZERO);
    }

    #[test]
    fn test_set_replaces_and_marks_dirty() {
        let mut materials = MaterialRegistry::new();
        let id = materials.create("m", ShaderId(0), LAYER_OPAQUE);
        let material = materials.get_mut(id).unwrap();
        material.set("shininess", MaterialValue::Float(8.0));
        material.mark_clean();

        material.set("shininess", MaterialValue::Float(16.0));
        assert!(material.is_dirty());
        assert_eq!(material.values().len(), 1);
        assert_eq!(material.get("shininess"), Some(MaterialValue::Float(16.0)));
    }

    #[test]
    fn test_missing_textures_are_none() {
        let mut shaders = ShaderRegistry::new();
        let shader_id = shaders.register_standard().unwrap();
        let shader = shaders.get(shader_id).unwrap();

        let mut materials = MaterialRegistry::new();
        let id = materials.create("m", shader_id, LAYER_OPAQUE);
        let material = materials.get_mut(id).unwrap();
        material.set("specular", MaterialValue::Texture(TextureId(4)));

        assert_eq!(material.textures(shader), vec![None, None, Some(TextureId(4))]);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut materials = MaterialRegistry::new();
        let a = materials.create("a", ShaderId(0), LAYER_OPAQUE);
        let b = materials.create("b", ShaderId(0), LAYER_SKYBOX);
        assert!(a < b);
        assert_eq!(materials.get(b).unwrap().render_layer, LAYER_SKYBOX);
    }
}
