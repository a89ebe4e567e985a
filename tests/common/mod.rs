//! Shared scene setup for the headless pipeline tests

#![allow(dead_code)]

use deferred_pipeline::resources::{Assets, MaterialId, MaterialValue, Mesh, ShaderId, TextureData, LAYER_OPAQUE, LAYER_SKYBOX};
use deferred_pipeline::scene::{Camera, DirectionalLight, MeshRenderer, Scene, Transform};
use deferred_pipeline::{Engine, HeadlessBackend, PipelineConfig};
use glam::Vec3;

/// Options for [`test_scene`]
#[derive(Debug, Clone, Copy)]
pub struct SceneOptions {
    pub light: bool,
    pub cast_shadows: bool,
    pub skybox: bool,
    /// Boxes per material
    pub boxes: usize,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            light: true,
            cast_shadows: true,
            skybox: true,
            boxes: 2,
        }
    }
}

fn solid_material(assets: &mut Assets, shader: ShaderId, name: &str, color: [u8; 4]) -> MaterialId {
    let texture = assets.textures.add(TextureData::solid_color(color, name));
    let id = assets.materials.create(name, shader, LAYER_OPAQUE);
    let material = assets.materials.get_mut(id).unwrap();
    material.set("diffuse", MaterialValue::Texture(texture));
    material.set("shininess", MaterialValue::Float(32.0));
    id
}

/// Floor plus boxes in two materials sharing the standard shader, and
/// optionally a skybox
pub fn test_scene(options: SceneOptions) -> (Assets, Scene) {
    let mut assets = Assets::new();
    let standard = assets.shaders.register_standard().unwrap();
    let skybox_shader = assets.shaders.register_skybox().unwrap();

    let red = solid_material(&mut assets, standard, "red", [200, 30, 30, 255]);
    let blue = solid_material(&mut assets, standard, "blue", [30, 30, 200, 255]);
    let cube = assets.meshes.add(Mesh::cube());
    let floor = assets.meshes.add(Mesh::plane(10.0, 10.0, 1));

    let mut scene = Scene::new();
    scene.camera = Camera::new(Vec3::new(4.0, -4.0, 3.0), Vec3::ZERO);
    if options.light {
        scene.spawn_light(DirectionalLight::new(Vec3::new(-1.0, 0.5, -2.0), Vec3::ONE));
    }

    let renderer = |mesh, material| {
        let renderer = MeshRenderer::new(mesh, material);
        if options.cast_shadows {
            renderer
        } else {
            renderer.without_shadows()
        }
    };

    scene.spawn_object(Transform::default(), renderer(floor, blue));
    for i in 0..options.boxes {
        let offset = i as f32 * 1.5;
        scene.spawn_object(
            Transform::from_position(Vec3::new(offset, 0.0, 0.5)),
            renderer(cube, red),
        );
        scene.spawn_object(
            Transform::from_position(Vec3::new(-offset, 1.5, 0.5)),
            renderer(cube, blue),
        );
    }

    if options.skybox {
        let sky_texture = assets
            .textures
            .add(TextureData::sky_gradient(16, 8, [40, 90, 200], [200, 220, 240], [60, 60, 60]));
        let sky_material = assets.materials.create("sky", skybox_shader, LAYER_SKYBOX);
        assets
            .materials
            .get_mut(sky_material)
            .unwrap()
            .set("environment", MaterialValue::Texture(sky_texture));
        let sky = assets.meshes.add(Mesh::sphere(8, 4).invert_faces());
        scene.spawn_object(Transform::default(), MeshRenderer::new(sky, sky_material).without_shadows());
    }

    (assets, scene)
}

pub fn config(width: u32, height: u32) -> PipelineConfig {
    PipelineConfig {
        width,
        height,
        ..Default::default()
    }
}

/// Headless engine whose surface starts at the configured size
pub fn engine(width: u32, height: u32, options: SceneOptions) -> Engine<HeadlessBackend> {
    let (assets, scene) = test_scene(options);
    Engine::new(HeadlessBackend::new(width, height), &config(width, height), scene, assets).unwrap()
}
