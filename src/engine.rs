//! Engine: owns the backend, the scene and the deferred pipeline
//!
//! The frame loop is `update` (behaviours and world matrices), then
//! `render_scene` (all passes up to the present blit), optional overlay
//! drawing, then `end_frame`.

use crate::backend::{FrameContext, GraphicsBackend};
use crate::error::PipelineResult;
use crate::pipeline::{DeferredPipeline, FrameReport};
use crate::resources::Assets;
use crate::scene::Scene;
use crate::time::{FrameStats, FrameTime};
use crate::PipelineConfig;

/// The deferred renderer bound to one backend
pub struct Engine<B: GraphicsBackend> {
    backend: B,
    scene: Scene,
    assets: Assets,
    pipeline: DeferredPipeline,
    time: FrameTime,
    stats: FrameStats,
    width: u32,
    height: u32,
}

impl<B: GraphicsBackend> Engine<B> {
    /// Create the engine and build every pipeline for the registered shaders
    pub fn new(mut backend: B, config: &PipelineConfig, scene: Scene, assets: Assets) -> PipelineResult<Self> {
        log::info!("Initializing engine '{}'", config.title);

        let pipeline = DeferredPipeline::new(&mut backend, config, &assets)?;
        let (width, height) = backend.surface_size();

        let mut engine = Self {
            backend,
            scene,
            assets,
            pipeline,
            time: FrameTime::default(),
            stats: FrameStats::new(),
            width,
            height,
        };
        engine.scene.camera.set_aspect(width as f32, height as f32);
        engine.scene.update_world_matrices();

        log::info!(
            "Engine ready: surface {}x{}, targets {}x{}",
            width,
            height,
            engine.pipeline.target_size().0,
            engine.pipeline.target_size().1
        );
        Ok(engine)
    }

    /// Advance time by a wall-clock delta and update the scene
    pub fn update(&mut self, raw_delta: f32) {
        self.time = self.time.advance(raw_delta);
        self.stats.record(raw_delta);
        self.scene.update_behaviours(&self.time);
        self.scene.update_world_matrices();
    }

    /// Handle window resize
    ///
    /// Only the surface and the camera aspect follow the window. Offscreen
    /// targets keep their initial size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.resize(width, height);

        // The backend may clamp to device limits
        let (actual_width, actual_height) = self.backend.surface_size();
        if actual_width == self.width && actual_height == self.height {
            return;
        }

        log::debug!(
            "Surface resized {}x{} -> {}x{}",
            self.width,
            self.height,
            actual_width,
            actual_height
        );
        self.width = actual_width;
        self.height = actual_height;
        self.scene
            .camera
            .set_aspect(actual_width as f32, actual_height as f32);
    }

    /// Render a frame (convenience method that calls render_scene + end_frame)
    pub fn render(&mut self) -> PipelineResult<FrameReport> {
        let (_, report) = self.render_scene()?;
        self.end_frame()?;
        Ok(report)
    }

    /// Run every pass without presenting. Call end_frame() after to present.
    /// Use this when you need to render additional content (like egui) before presenting.
    pub fn render_scene(&mut self) -> PipelineResult<(FrameContext, FrameReport)> {
        let frame = self.backend.begin_frame()?;
        let report = self.pipeline.render(
            &mut self.backend,
            &frame,
            &mut self.scene,
            &mut self.assets,
            &self.time,
        )?;
        Ok((frame, report))
    }

    /// End the frame and present to the screen.
    /// Call this after render_scene() and any overlay rendering (like egui).
    pub fn end_frame(&mut self) -> PipelineResult<()> {
        self.backend.end_frame()?;
        Ok(())
    }

    /// Current surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn time(&self) -> &FrameTime {
        &self.time
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut Assets {
        &mut self.assets
    }

    pub fn pipeline(&self) -> &DeferredPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut DeferredPipeline {
        &mut self.pipeline
    }

    /// Pipeline, scene and stats at once, for UI code editing several of them
    pub fn ui_state(&mut self) -> (&mut DeferredPipeline, &mut Scene, &FrameStats) {
        (&mut self.pipeline, &mut self.scene, &self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::resources::{MaterialValue, Mesh, MeshId, TextureData, LAYER_OPAQUE};
    use crate::scene::{Behaviour, Behaviours, DirectionalLight, MeshRenderer, Transform, WorldMatrix};
    use glam::Vec3;

    fn engine() -> (Engine<HeadlessBackend>, bevy_ecs::entity::Entity) {
        let mut assets = Assets::new();
        let shader = assets.shaders.register_standard().unwrap();
        let texture = assets.textures.add(TextureData::white());
        let mesh = assets.meshes.add(Mesh::cube());
        let material = assets.materials.create("cube", shader, LAYER_OPAQUE);
        assets
            .materials
            .get_mut(material)
            .unwrap()
            .set("diffuse", MaterialValue::Texture(texture));

        let mut scene = Scene::new();
        scene.spawn_light(DirectionalLight::default());
        let cube = scene.spawn_object(Transform::default(), MeshRenderer::new(mesh, material));
        scene.add_behaviours(
            cube,
            Behaviours::new().with(Behaviour::follow_path(vec![Vec3::ZERO, Vec3::X], 1.0)),
        );

        let config = PipelineConfig {
            width: 64,
            height: 48,
            ..Default::default()
        };
        let engine = Engine::new(HeadlessBackend::new(64, 48), &config, scene, assets).unwrap();
        (engine, cube)
    }

    #[test]
    fn test_render_presents_a_frame() {
        let (mut engine, _) = engine();
        let report = engine.render().unwrap();

        assert_eq!(report.items, 1);
        assert_eq!(report.geometry.draws, 1);
        assert!(report.lit);
        assert_eq!(engine.backend().frame_index(), 1);
        assert!(engine.backend().violations().is_empty());
    }

    #[test]
    fn test_update_moves_behaviours() {
        let (mut engine, cube) = engine();
        engine.update(0.5);

        let world = engine.scene().world.get::<WorldMatrix>(cube).unwrap();
        assert!((world.translation() - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(engine.time().elapsed, 0.5);
        assert_eq!(engine.stats().current(), 2.0);
    }

    #[test]
    fn test_zero_light_direction_renders() {
        let (mut engine, _) = engine();
        if let Some(mut light) = engine.scene_mut().light_mut() {
            light.direction = Vec3::ZERO;
        }
        let report = engine.render().unwrap();

        assert!(report.lit);
        assert!(engine.backend().violations().is_empty());
    }

    #[test]
    fn test_unknown_mesh_is_skipped() {
        let (mut engine, cube) = engine();
        let material = engine.scene().world.get::<MeshRenderer>(cube).unwrap().material;
        engine
            .scene_mut()
            .spawn_object(Transform::default(), MeshRenderer::new(MeshId(99), material));

        for _ in 0..2 {
            let report = engine.render().unwrap();
            assert_eq!(report.items, 2);
            assert_eq!(report.geometry.draws, 1);
        }
        assert_eq!(engine.backend().frame_index(), 2);
        assert!(engine.backend().violations().is_empty());
    }

    #[test]
    fn test_resize_keeps_targets() {
        let (mut engine, _) = engine();
        engine.resize(32, 32);
        engine.resize(0, 10);

        assert_eq!(engine.dimensions(), (32, 32));
        assert_eq!(engine.pipeline().target_size(), (64, 48));
        let report = engine.render().unwrap();
        assert_eq!(report.viewport, (32, 32));
    }
}
