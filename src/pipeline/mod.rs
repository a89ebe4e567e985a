//! Deferred rendering pipeline
//!
//! Every frame runs the same fixed sequence:
//! 1. Shadow pass - scene depth from the directional light
//! 2. G-Buffer pass - albedo, normal, specular and position targets
//! 3. Lighting pass - fullscreen shading into the illumination buffer
//! 4. Post-processing - the active effect, or a debug view of one buffer,
//!    presented to the screen
//!
//! Offscreen targets are allocated once at the initial window size; later
//! window sizes only change the viewport.

pub mod display_mode;
pub mod fullscreen;
pub mod gbuffer_pass;
pub mod gpu_resources;
pub mod lighting_pass;
pub mod postprocess;
pub mod shadow_pass;

pub use display_mode::{DisplayMode, DisplayModeSelector, DisplaySource};
pub use gbuffer_pass::{GBufferPass, GeometryStats};
pub use lighting_pass::LightingPass;
pub use shadow_pass::ShadowPass;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{Fullscreen, ScreenBlit};
use crate::pipeline::gpu_resources::{GpuResources, SharedLayouts};
use crate::pipeline::postprocess::{EffectKey, EffectRegistry};
use crate::render_queue::build_render_queue;
use crate::resources::Assets;
use crate::scene::{LightState, Scene};
use crate::time::FrameTime;
use crate::PipelineConfig;
use glam::Mat4;

/// What a frame put on the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presented {
    Effect(EffectKey),
    GBuffer(usize),
    #[default]
    Illumination,
}

/// Summary of one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub items: usize,
    pub shadow_draws: usize,
    pub geometry: GeometryStats,
    pub lit: bool,
    pub presented: Presented,
    pub viewport: (u32, u32),
}

/// The deferred renderer and every GPU resource it owns
pub struct DeferredPipeline {
    config: PipelineConfig,
    width: u32,
    height: u32,
    layouts: SharedLayouts,
    fullscreen: Fullscreen,
    screen: ScreenBlit,
    gpu: GpuResources,
    frame_buffer: BufferHandle,
    frame_group: BindGroupHandle,
    shadow: ShadowPass,
    gbuffer: GBufferPass,
    lighting: LightingPass,
    effects: EffectRegistry,
    active_effect: usize,
    warned_effect: Option<usize>,
    display: DisplayModeSelector,
    last_report: FrameReport,
}

impl DeferredPipeline {
    /// Allocate targets and build every pipeline
    ///
    /// Shader or pipeline failures here are fatal and returned as errors.
    pub fn new(backend: &mut dyn GraphicsBackend, config: &PipelineConfig, assets: &Assets) -> PipelineResult<Self> {
        let width = config.width.max(1);
        let height = config.height.max(1);
        log::info!("Initializing deferred pipeline at {}x{}", width, height);

        let layouts = SharedLayouts::new(backend)?;
        let fullscreen = Fullscreen::new(backend)?;
        let screen_format = backend.swapchain_format();
        let screen = ScreenBlit::new(backend, &fullscreen, screen_format)?;
        let mut gpu = GpuResources::new(backend)?;

        let frame_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "Frame Uniform",
            std::mem::size_of::<FrameUniform>() as u64,
        ))?;
        let frame_group = backend.create_bind_group(layouts.frame, &[(0, BindGroupEntry::buffer(frame_buffer))])?;

        let shadow = ShadowPass::new(backend, &layouts, &config.shadow)?;
        let mut gbuffer = GBufferPass::new(backend, width, height, config.clear_color)?;
        gbuffer.prepare_shaders(backend, &assets.shaders, &mut gpu, &layouts)?;
        let lighting = LightingPass::new(backend, &fullscreen, &layouts, &gbuffer, config.clear_color)?;
        let effects = EffectRegistry::from_catalog(backend, &fullscreen, &config.effects, width, height)?;

        Ok(Self {
            config: config.clone(),
            width,
            height,
            layouts,
            fullscreen,
            screen,
            gpu,
            frame_buffer,
            frame_group,
            shadow,
            gbuffer,
            lighting,
            effects,
            active_effect: 0,
            warned_effect: None,
            display: DisplayModeSelector::new(),
            last_report: FrameReport::default(),
        })
    }

    /// Render one frame of `scene` into `frame`'s swapchain view
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        frame: &FrameContext,
        scene: &mut Scene,
        assets: &mut Assets,
        time: &FrameTime,
    ) -> PipelineResult<FrameReport> {
        let viewport = (
            frame.width.clamp(1, self.width),
            frame.height.clamp(1, self.height),
        );

        let items = scene.collect_renderables(&assets.materials);
        let queue = build_render_queue(&items);

        // Uploads and uniform writes all happen before the first pass
        self.gbuffer
            .prepare_shaders(backend, &assets.shaders, &mut self.gpu, &self.layouts)?;
        self.gpu.sync(backend, assets, &queue)?;
        self.gpu.write_objects(backend, &self.layouts, &queue)?;

        let camera = &scene.camera;
        let light = scene
            .light()
            .map(|l| LightState::compute(&l, camera.view_matrix(), &self.config.shadow));
        let frame_uniform = FrameUniform {
            view: camera.view_matrix(),
            proj: camera.projection_matrix(),
            view_proj: camera.view_projection_matrix(),
            light_space: light.map(|l| l.light_space).unwrap_or(Mat4::IDENTITY),
            camera_position: camera.world_position().extend(1.0),
        };
        backend.write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(&frame_uniform));
        self.screen.set_region(
            backend,
            viewport.0 as f32 / self.width as f32,
            viewport.1 as f32 / self.height as f32,
        );

        let shadow_draws = self.shadow.execute(backend, &queue, &self.gpu, self.frame_group);
        let geometry = self.gbuffer.execute(
            backend,
            &queue,
            &self.gpu,
            self.frame_group,
            self.shadow.sample_group(),
            viewport,
        );
        let lit = self
            .lighting
            .execute(backend, light.as_ref(), self.shadow.sample_group());

        self.effects.clear_all(backend);
        let presented = self.present(backend, frame.swapchain_view, time)?;

        let report = FrameReport {
            items: queue.len(),
            shadow_draws,
            geometry,
            lit,
            presented,
            viewport,
        };
        log::trace!("Frame report: {:?}", report);
        self.last_report = report;
        Ok(report)
    }

    fn present(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        screen: TextureViewHandle,
        time: &FrameTime,
    ) -> PipelineResult<Presented> {
        let illumination = self.lighting.target().view;

        match self.display.get().source() {
            DisplaySource::ActiveEffect => match self.effects.get_index_mut(self.active_effect) {
                Some(effect) => {
                    effect.apply(backend, &self.fullscreen, illumination, time)?;
                    effect.draw_to_screen(backend, &self.fullscreen, &mut self.screen, screen)?;
                    Ok(Presented::Effect(effect.key()))
                }
                None => {
                    if self.warned_effect != Some(self.active_effect) {
                        log::warn!(
                            "Active effect index {} out of range ({} effects), presenting illumination buffer",
                            self.active_effect,
                            self.effects.len()
                        );
                        self.warned_effect = Some(self.active_effect);
                    }
                    self.screen
                        .blit(backend, &self.fullscreen, "Present", illumination, screen)?;
                    Ok(Presented::Illumination)
                }
            },
            DisplaySource::GBuffer(index) => {
                let view = self.gbuffer.targets()[index].view;
                self.screen.blit(backend, &self.fullscreen, "Present", view, screen)?;
                Ok(Presented::GBuffer(index))
            }
            DisplaySource::Illumination => {
                self.screen
                    .blit(backend, &self.fullscreen, "Present", illumination, screen)?;
                Ok(Presented::Illumination)
            }
        }
    }

    /// Size of every offscreen target
    pub fn target_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn shadow(&self) -> &ShadowPass {
        &self.shadow
    }

    pub fn gbuffer(&self) -> &GBufferPass {
        &self.gbuffer
    }

    pub fn lighting(&self) -> &LightingPass {
        &self.lighting
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectRegistry {
        &mut self.effects
    }

    pub fn active_effect(&self) -> usize {
        self.active_effect
    }

    /// Select the effect run in the normal display modes; out of range falls
    /// back to presenting the illumination buffer
    pub fn set_active_effect(&mut self, index: usize) {
        if index != self.active_effect {
            log::debug!("Active effect: {} -> {}", self.active_effect, index);
            self.active_effect = index;
            self.warned_effect = None;
        }
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display.get()
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display.set(mode);
    }

    pub fn toggle_display_mode(&mut self, mode: DisplayMode) {
        self.display.toggle(mode);
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn gpu_resources(&self) -> &GpuResources {
        &self.gpu
    }
}

/// Every built-in WGSL module with the entry points it must define
pub fn builtin_shaders() -> Vec<(&'static str, String, &'static [&'static str])> {
    use crate::pipeline::fullscreen::fullscreen_source;
    use crate::pipeline::postprocess::{bloom, color_filter, film_grain, pixelated};

    const FULLSCREEN: &[&str] = &["vs_main", "fs_main"];
    vec![
        ("shadow", shadow_pass::SHADOW_SHADER.to_string(), &["vs_main"]),
        ("lighting", fullscreen_source(lighting_pass::LIGHTING_SHADER), FULLSCREEN),
        ("blit", fullscreen_source(fullscreen::BLIT_SHADER), FULLSCREEN),
        ("bloom extract", fullscreen_source(bloom::BLOOM_EXTRACT_SHADER), FULLSCREEN),
        ("bloom blur", fullscreen_source(bloom::BLOOM_BLUR_SHADER), FULLSCREEN),
        ("bloom composite", fullscreen_source(bloom::BLOOM_COMPOSITE_SHADER), FULLSCREEN),
        ("film grain", fullscreen_source(film_grain::FILM_GRAIN_SHADER), FULLSCREEN),
        ("pixelated", fullscreen_source(pixelated::PIXELATED_SHADER), FULLSCREEN),
        ("color filter", fullscreen_source(color_filter::COLOR_FILTER_SHADER), FULLSCREEN),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::validate_wgsl;

    #[test]
    fn test_builtin_shaders_validate() {
        for (name, source, entries) in builtin_shaders() {
            if let Err(e) = validate_wgsl(name, &source, entries) {
                panic!("{}", e);
            }
        }
    }
}
