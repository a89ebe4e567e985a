//! GPU copies of scene assets
//!
//! Meshes and textures are uploaded the first time a queued item needs them.
//! Material bind groups are rebuilt whenever the material is dirty. Object
//! uniforms live in a pool indexed by draw slot, so the shadow and geometry
//! passes bind the same buffer for the same item.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{PipelineError, PipelineResult};
use crate::render_queue::RenderQueue;
use crate::resources::*;
use std::collections::{HashMap, HashSet};

/// Bind group layouts shared by the shadow, geometry and lighting passes
#[derive(Debug, Clone, Copy)]
pub struct SharedLayouts {
    /// group 0 of geometry shaders
    pub frame: BindGroupLayoutHandle,
    /// group 1 of geometry shaders
    pub object: BindGroupLayoutHandle,
    /// Shadow depth texture and comparison sampler
    pub shadow: BindGroupLayoutHandle,
}

impl SharedLayouts {
    pub fn new(backend: &mut dyn GraphicsBackend) -> PipelineResult<Self> {
        let frame =
            backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)])?;
        let object =
            backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT)])?;
        let shadow = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Depth),
            BindGroupLayoutEntry::sampler(1, true),
        ])?;
        Ok(Self { frame, object, shadow })
    }
}

/// Uniform buffer and bind group of one material
#[derive(Debug, Clone, Copy)]
pub struct GpuMaterial {
    pub buffer: BufferHandle,
    pub bind_group: BindGroupHandle,
}

/// Object uniform of one draw slot
#[derive(Debug, Clone, Copy)]
pub struct GpuObject {
    pub buffer: BufferHandle,
    pub bind_group: BindGroupHandle,
}

/// Cache of everything uploaded for the scene
pub struct GpuResources {
    meshes: HashMap<MeshId, GpuMesh>,
    textures: HashMap<TextureId, GpuTexture>,
    white: GpuTexture,
    material_sampler: SamplerHandle,
    material_layouts: HashMap<ShaderId, BindGroupLayoutHandle>,
    materials: HashMap<MaterialId, GpuMaterial>,
    objects: Vec<GpuObject>,
    /// Unknown meshes already reported, so each warns once
    missing_meshes: HashSet<MeshId>,
}

impl GpuResources {
    pub fn new(backend: &mut dyn GraphicsBackend) -> PipelineResult<Self> {
        let white = GpuTexture::create(backend, &TextureData::white())?;
        let material_sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Material Sampler".into()),
            address_mode: AddressMode::Repeat,
            ..Default::default()
        })?;

        Ok(Self {
            meshes: HashMap::new(),
            textures: HashMap::new(),
            white,
            material_sampler,
            material_layouts: HashMap::new(),
            materials: HashMap::new(),
            objects: Vec::new(),
            missing_meshes: HashSet::new(),
        })
    }

    /// Layout of a shader's material group, created on first use
    pub fn material_layout(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        shader: &Shader,
    ) -> PipelineResult<BindGroupLayoutHandle> {
        if let Some(layout) = self.material_layouts.get(&shader.id) {
            return Ok(*layout);
        }

        let mut entries = vec![
            BindGroupLayoutEntry::uniform(0, ShaderStageFlags::VERTEX_FRAGMENT),
            BindGroupLayoutEntry::sampler(1, false),
        ];
        for slot in 0..shader.texture_names.len() {
            entries.push(BindGroupLayoutEntry::texture(
                slot as u32 + 2,
                TextureSampleType::Float { filterable: true },
            ));
        }
        let layout = backend.create_bind_group_layout(&entries)?;
        self.material_layouts.insert(shader.id, layout);
        Ok(layout)
    }

    /// Upload whatever the queue needs that is missing or out of date
    ///
    /// Items whose mesh is unknown get nothing uploaded; the passes skip them.
    pub fn sync(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        assets: &mut Assets,
        queue: &RenderQueue,
    ) -> PipelineResult<()> {
        let mut seen_materials = HashSet::new();
        for item in queue.iter() {
            if !self.meshes.contains_key(&item.mesh) {
                let Some(mesh) = assets.meshes.get(item.mesh) else {
                    if self.missing_meshes.insert(item.mesh) {
                        log::warn!("Entity {:?} references unknown mesh {:?}, skipping", item.entity, item.mesh);
                    }
                    continue;
                };
                let gpu_mesh = GpuMesh::upload(backend, mesh)?;
                log::debug!("Uploaded mesh '{}' ({} triangles)", mesh.name, mesh.triangle_count());
                self.meshes.insert(item.mesh, gpu_mesh);
            }
            if seen_materials.insert(item.material) {
                self.sync_material(backend, assets, item.material)?;
            }
        }
        Ok(())
    }

    fn sync_material(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        assets: &mut Assets,
        id: MaterialId,
    ) -> PipelineResult<()> {
        let Assets {
            textures,
            shaders,
            materials,
            ..
        } = assets;
        let material = materials
            .get_mut(id)
            .ok_or(PipelineError::MissingResource { kind: "material", id: id.0 })?;
        if !material.is_dirty() && self.materials.contains_key(&id) {
            return Ok(());
        }

        let shader = shaders.get(material.shader).ok_or(PipelineError::MissingResource {
            kind: "shader",
            id: material.shader.0,
        })?;
        let layout = self.material_layout(backend, shader)?;

        let uniform = material.pack_uniforms(shader);
        let buffer = match self.materials.get(&id) {
            Some(existing) => {
                backend.write_buffer(existing.buffer, 0, bytemuck::bytes_of(&uniform));
                existing.buffer
            }
            None => backend.create_buffer_init(
                &BufferDescriptor::uniform(
                    &format!("{} Material", material.name),
                    std::mem::size_of::<MaterialUniform>() as u64,
                ),
                bytemuck::bytes_of(&uniform),
            )?,
        };

        let mut entries = vec![
            (0, BindGroupEntry::buffer(buffer)),
            (1, BindGroupEntry::Sampler(self.material_sampler)),
        ];
        for (slot, texture) in material.textures(shader).into_iter().enumerate() {
            let view = match texture {
                Some(texture_id) => self.texture_view(backend, textures, texture_id, &material.name)?,
                None => self.white.view,
            };
            entries.push((slot as u32 + 2, BindGroupEntry::Texture(view)));
        }
        let bind_group = backend.create_bind_group(layout, &entries)?;

        log::debug!("Built bind group for material '{}'", material.name);
        self.materials.insert(id, GpuMaterial { buffer, bind_group });
        material.mark_clean();
        Ok(())
    }

    fn texture_view(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        textures: &TextureRegistry,
        id: TextureId,
        material: &str,
    ) -> PipelineResult<TextureViewHandle> {
        if let Some(texture) = self.textures.get(&id) {
            return Ok(texture.view);
        }
        let Some(data) = textures.get(id) else {
            log::warn!("Material '{}' references unknown texture {:?}, using white", material, id);
            return Ok(self.white.view);
        };
        let texture = GpuTexture::create(backend, data)?;
        self.textures.insert(id, texture);
        Ok(texture.view)
    }

    /// Write every queued item's object uniform into its slot
    pub fn write_objects(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        layouts: &SharedLayouts,
        queue: &RenderQueue,
    ) -> PipelineResult<()> {
        while self.objects.len() < queue.len() {
            let buffer = backend.create_buffer(&BufferDescriptor::uniform(
                &format!("Object {}", self.objects.len()),
                std::mem::size_of::<ObjectUniform>() as u64,
            ))?;
            let bind_group = backend.create_bind_group(layouts.object, &[(0, BindGroupEntry::buffer(buffer))])?;
            self.objects.push(GpuObject { buffer, bind_group });
        }

        for (slot, item) in queue.slots() {
            let uniform = crate::scene::WorldMatrix(item.world).uniform();
            backend.write_buffer(self.objects[slot].buffer, 0, bytemuck::bytes_of(&uniform));
        }
        Ok(())
    }

    pub fn mesh(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&GpuMaterial> {
        self.materials.get(&id)
    }

    pub fn object(&self, slot: usize) -> Option<&GpuObject> {
        self.objects.get(slot)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::render_queue::{build_render_queue, RenderableItem};
    use bevy_ecs::entity::Entity;
    use glam::Mat4;

    fn setup() -> (HeadlessBackend, Assets, RenderQueue) {
        let mut assets = Assets::new();
        let shader = assets.shaders.register_standard().unwrap();
        let mesh = assets.meshes.add(Mesh::cube());
        let texture = assets.textures.add(TextureData::checkerboard(8, [0; 4], [255; 4]));
        let material = assets.materials.create("box", shader, LAYER_OPAQUE);
        assets
            .materials
            .get_mut(material)
            .unwrap()
            .set("diffuse", MaterialValue::Texture(texture));

        let items: Vec<_> = (0..3)
            .map(|i| RenderableItem {
                entity: Entity::from_raw(i),
                mesh,
                material,
                shader,
                render_layer: LAYER_OPAQUE,
                world: Mat4::IDENTITY,
                cast_shadows: true,
            })
            .collect();
        (HeadlessBackend::new(32, 32), assets, build_render_queue(&items))
    }

    #[test]
    fn test_sync_uploads_once_and_cleans_materials() {
        let (mut backend, mut assets, queue) = setup();
        let mut gpu = GpuResources::new(&mut backend).unwrap();

        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        assert_eq!(gpu.mesh_count(), 1);
        assert_eq!(gpu.texture_count(), 1);
        assert!(assets.materials.iter().all(|m| !m.is_dirty()));

        let group = gpu.material(MaterialId(0)).unwrap().bind_group;
        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        assert_eq!(gpu.material(MaterialId(0)).unwrap().bind_group, group);
    }

    #[test]
    fn test_dirty_material_is_rebuilt() {
        let (mut backend, mut assets, queue) = setup();
        let mut gpu = GpuResources::new(&mut backend).unwrap();
        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        let before = *gpu.material(MaterialId(0)).unwrap();

        assets
            .materials
            .get_mut(MaterialId(0))
            .unwrap()
            .set("shininess", MaterialValue::Float(32.0));
        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        let after = *gpu.material(MaterialId(0)).unwrap();

        assert_eq!(before.buffer, after.buffer);
        assert_ne!(before.bind_group, after.bind_group);
        let bytes = backend.buffer_contents(after.buffer).unwrap();
        let uniform: MaterialUniform = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(uniform.values[0].x, 32.0);
    }

    #[test]
    fn test_missing_mesh_is_skipped() {
        let (mut backend, mut assets, _) = setup();
        let item = RenderableItem {
            entity: Entity::from_raw(0),
            mesh: MeshId(42),
            material: MaterialId(0),
            shader: ShaderId(0),
            render_layer: 0,
            world: Mat4::IDENTITY,
            cast_shadows: true,
        };
        let mut gpu = GpuResources::new(&mut backend).unwrap();
        let queue = build_render_queue(&[item]);
        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        gpu.sync(&mut backend, &mut assets, &queue).unwrap();
        assert!(gpu.mesh(MeshId(42)).is_none());
        assert_eq!(gpu.mesh_count(), 0);
        assert_eq!(gpu.missing_meshes.len(), 1);
    }

    #[test]
    fn test_object_pool_grows_to_queue() {
        let (mut backend, _, queue) = setup();
        let layouts = SharedLayouts::new(&mut backend).unwrap();
        let mut gpu = GpuResources::new(&mut backend).unwrap();
        gpu.write_objects(&mut backend, &layouts, &queue).unwrap();
        assert!(gpu.object(2).is_some());
        assert!(gpu.object(3).is_none());
    }
}
