//! Deferred Pipeline - a multi-pass deferred renderer
//!
//! Each frame runs a fixed sequence of passes over a bevy_ecs scene:
//! - Shadow depth from a single directional light
//! - Geometry pass filling a four-target G-buffer
//! - Full-screen lighting pass into an illumination buffer
//! - One selectable post-processing effect, or a debug view of an
//!   intermediate buffer, presented to the screen
//!
//! Rendering goes through the [`backend::GraphicsBackend`] trait, implemented
//! by [`WgpuBackend`] for windows and by [`HeadlessBackend`] for tests.

pub mod backend;
pub mod egui_integration;
pub mod engine;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod render_queue;
pub mod resources;
pub mod scene;
pub mod time;
pub mod ui;
pub mod window;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use backend::headless::HeadlessBackend;
pub use backend::wgpu_backend::WgpuBackend;
pub use egui_integration::WgpuEguiIntegration;
pub use engine::Engine;
pub use error::{PipelineError, PipelineResult, ShaderError};
pub use pipeline::postprocess::EffectKey;
pub use time::FrameTime;
pub use window::Window;

/// Shadow map parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    /// Width and height of the square shadow depth texture
    pub resolution: u32,
    /// Half extent of the light's orthographic frustum
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 4096,
            half_extent: 20.0,
            near: -30.0,
            far: 30.0,
        }
    }
}

/// Configuration for initializing the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Window title
    pub title: String,
    /// Initial window width, also the size of every offscreen target
    pub width: u32,
    /// Initial window height, also the size of every offscreen target
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Clear colour of the G-buffer albedo and illumination targets
    pub clear_color: [f32; 4],
    pub shadow: ShadowConfig,
    /// Post effects in catalog order
    pub effects: Vec<EffectKey>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Deferred Pipeline".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            clear_color: [1.0, 1.0, 1.0, 0.3],
            shadow: ShadowConfig::default(),
            effects: EffectKey::DEFAULT_CATALOG.to_vec(),
        }
    }
}
