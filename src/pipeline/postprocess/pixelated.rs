//! Pixelation by snapping texture coordinates to a block grid

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{clear_target, fullscreen_pass, Fullscreen, RenderTarget, TextureGroupCache};
use crate::pipeline::postprocess::{EffectKey, PostEffect};
use crate::time::FrameTime;
use bytemuck::{Pod, Zeroable};
use std::any::Any;

pub const PIXELATED_SHADER: &str = r#"
struct PixelParams {
    // Blocks across x and y
    blocks: vec2<f32>,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> params: PixelParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let snapped = (floor(input.uv * params.blocks) + vec2<f32>(0.5)) / params.blocks;
    return textureSample(source_texture, source_sampler, snapped);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct PixelParams {
    blocks: [f32; 2],
    _pad: [f32; 2],
}

struct PixelResources {
    output: RenderTarget,
    pipeline: RenderPipelineHandle,
    params_buffer: BufferHandle,
    params_group: BindGroupHandle,
    written: Option<PixelParams>,
    inputs: TextureGroupCache,
}

/// Downsampled blocky look; `pixels` is the block count across the width
pub struct PixelatedEffect {
    pixels: f32,
    resources: Option<PixelResources>,
}

impl PixelatedEffect {
    pub fn new() -> Self {
        Self {
            pixels: 512.0,
            resources: None,
        }
    }

    pub fn pixels(&self) -> f32 {
        self.pixels
    }

    /// Horizontal block count, clamped to 256..=1024
    pub fn set_pixels(&mut self, pixels: f32) {
        self.pixels = pixels.clamp(256.0, 1024.0);
    }
}

impl Default for PixelatedEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for PixelatedEffect {
    fn key(&self) -> EffectKey {
        EffectKey::Pixelated
    }

    fn init(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        let output = RenderTarget::new(backend, "Pixelated Output", width, height, TextureFormat::Rgba16Float)?;
        let pipeline = fullscreen.create_pipeline(
            backend,
            "Pixelated",
            PIXELATED_SHADER,
            vec![fullscreen.texture_layout, fullscreen.uniform_layout],
            TextureFormat::Rgba16Float,
        )?;
        let params_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "Pixelated Params",
            std::mem::size_of::<PixelParams>() as u64,
        ))?;
        let params_group = fullscreen.uniform_group(backend, params_buffer)?;

        self.resources = Some(PixelResources {
            output,
            pipeline,
            params_buffer,
            params_group,
            written: None,
            inputs: TextureGroupCache::default(),
        });
        Ok(())
    }

    fn clear(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(res) = &self.resources {
            clear_target(backend, "Pixelated Clear", res.output.view, [0.0; 4]);
        }
    }

    fn apply(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        input: TextureViewHandle,
        _time: &FrameTime,
    ) -> PipelineResult<()> {
        let pixels = self.pixels;
        let Some(res) = self.resources.as_mut() else {
            log::warn!("Pixelation applied before init");
            return Ok(());
        };

        // Square blocks: the vertical count follows the target's aspect
        let aspect = res.output.width as f32 / res.output.height.max(1) as f32;
        let params = PixelParams {
            blocks: [pixels, (pixels / aspect).max(1.0)],
            _pad: [0.0; 2],
        };
        if res.written != Some(params) {
            backend.write_buffer(res.params_buffer, 0, bytemuck::bytes_of(&params));
            res.written = Some(params);
        }

        let input_group = res.inputs.get_or_create(backend, fullscreen, input)?;
        fullscreen_pass(
            backend,
            "Pixelated",
            res.output.view,
            res.pipeline,
            &[input_group, res.params_group],
        );
        Ok(())
    }

    fn output(&self) -> Option<TextureViewHandle> {
        self.resources.as_ref().map(|r| r.output.view)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
