//! Bloom post-processing effect
//!
//! Bright texels above a luminance threshold are extracted, blurred with a
//! separable Gaussian ping-ponging between two targets, then added back onto
//! the input.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{clear_target, fullscreen_pass, Fullscreen, RenderTarget, TextureGroupCache};
use crate::pipeline::postprocess::{EffectKey, PostEffect};
use crate::time::FrameTime;
use bytemuck::{Pod, Zeroable};
use std::any::Any;

pub const MIN_BLOOM_PASSES: u32 = 1;
pub const MAX_BLOOM_PASSES: u32 = 10;

pub const BLOOM_EXTRACT_SHADER: &str = r#"
struct BloomParams {
    threshold: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var hdr_texture: texture_2d<f32>;
@group(0) @binding(1) var hdr_sampler: sampler;
@group(1) @binding(0) var<uniform> params: BloomParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(hdr_texture, hdr_sampler, input.uv);
    let luminance = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    let weight = max(luminance - params.threshold, 0.0) / max(luminance, 0.0001);
    return vec4<f32>(color.rgb * weight, 1.0);
}
"#;

pub const BLOOM_BLUR_SHADER: &str = r#"
struct BlurParams {
    texel_step: vec4<f32>,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> params: BlurParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let texel = params.texel_step.xy;
    var result = textureSample(source_texture, source_sampler, input.uv).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = texel * f32(i);
        result = result + textureSample(source_texture, source_sampler, input.uv + offset).rgb * weights[i];
        result = result + textureSample(source_texture, source_sampler, input.uv - offset).rgb * weights[i];
    }
    return vec4<f32>(result, 1.0);
}
"#;

pub const BLOOM_COMPOSITE_SHADER: &str = r#"
@group(0) @binding(0) var scene_texture: texture_2d<f32>;
@group(0) @binding(1) var scene_sampler: sampler;
@group(1) @binding(0) var bloom_texture: texture_2d<f32>;
@group(1) @binding(1) var bloom_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSample(scene_texture, scene_sampler, input.uv);
    let bloom = textureSample(bloom_texture, bloom_sampler, input.uv);
    return vec4<f32>(scene.rgb + bloom.rgb, scene.a);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct BloomParams {
    threshold: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurParams {
    texel_step: [f32; 4],
}

struct BloomResources {
    ping: RenderTarget,
    pong: RenderTarget,
    output: RenderTarget,
    extract_pipeline: RenderPipelineHandle,
    blur_pipeline: RenderPipelineHandle,
    composite_pipeline: RenderPipelineHandle,
    params_buffer: BufferHandle,
    params_group: BindGroupHandle,
    horizontal_group: BindGroupHandle,
    vertical_group: BindGroupHandle,
    ping_group: BindGroupHandle,
    pong_group: BindGroupHandle,
    inputs: TextureGroupCache,
}

/// Bloom post-processing effect
pub struct BloomEffect {
    threshold: f32,
    passes: u32,
    written: Option<BloomParams>,
    resources: Option<BloomResources>,
}

impl BloomEffect {
    pub fn new() -> Self {
        Self {
            threshold: 0.5,
            passes: 5,
            written: None,
            resources: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Luminance above which texels bloom, clamped to 0.01..=1.0
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.01, 1.0);
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Horizontal plus vertical blur iterations, clamped to 1..=10
    pub fn set_passes(&mut self, passes: u32) {
        self.passes = passes.clamp(MIN_BLOOM_PASSES, MAX_BLOOM_PASSES);
    }
}

impl Default for BloomEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for BloomEffect {
    fn key(&self) -> EffectKey {
        EffectKey::Bloom
    }

    fn init(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        let format = TextureFormat::Rgba16Float;
        let ping = RenderTarget::new(backend, "Bloom Ping", width, height, format)?;
        let pong = RenderTarget::new(backend, "Bloom Pong", width, height, format)?;
        let output = RenderTarget::new(backend, "Bloom Output", width, height, format)?;

        let sampled = vec![fullscreen.texture_layout, fullscreen.uniform_layout];
        let extract_pipeline =
            fullscreen.create_pipeline(backend, "Bloom Extract", BLOOM_EXTRACT_SHADER, sampled.clone(), format)?;
        let blur_pipeline = fullscreen.create_pipeline(backend, "Bloom Blur", BLOOM_BLUR_SHADER, sampled, format)?;
        let composite_pipeline = fullscreen.create_pipeline(
            backend,
            "Bloom Composite",
            BLOOM_COMPOSITE_SHADER,
            vec![fullscreen.texture_layout, fullscreen.texture_layout],
            format,
        )?;

        let params_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "Bloom Params",
            std::mem::size_of::<BloomParams>() as u64,
        ))?;
        let params_group = fullscreen.uniform_group(backend, params_buffer)?;

        let mut blur_group = |label: &str, step: [f32; 2]| -> PipelineResult<BindGroupHandle> {
            let params = BlurParams {
                texel_step: [step[0], step[1], 0.0, 0.0],
            };
            let buffer = backend.create_buffer_init(
                &BufferDescriptor::uniform(label, std::mem::size_of::<BlurParams>() as u64),
                bytemuck::bytes_of(&params),
            )?;
            fullscreen.uniform_group(backend, buffer)
        };
        let horizontal_group = blur_group("Bloom Blur Horizontal", [1.0 / width as f32, 0.0])?;
        let vertical_group = blur_group("Bloom Blur Vertical", [0.0, 1.0 / height as f32])?;

        let ping_group = fullscreen.texture_group(backend, ping.view)?;
        let pong_group = fullscreen.texture_group(backend, pong.view)?;

        self.written = None;
        self.resources = Some(BloomResources {
            ping,
            pong,
            output,
            extract_pipeline,
            blur_pipeline,
            composite_pipeline,
            params_buffer,
            params_group,
            horizontal_group,
            vertical_group,
            ping_group,
            pong_group,
            inputs: TextureGroupCache::default(),
        });
        Ok(())
    }

    fn clear(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(res) = &self.resources {
            clear_target(backend, "Bloom Clear Ping", res.ping.view, [0.0; 4]);
            clear_target(backend, "Bloom Clear Pong", res.pong.view, [0.0; 4]);
            clear_target(backend, "Bloom Clear Output", res.output.view, [0.0; 4]);
        }
    }

    fn apply(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        input: TextureViewHandle,
        _time: &FrameTime,
    ) -> PipelineResult<()> {
        let params = BloomParams {
            threshold: self.threshold,
            _pad: [0.0; 3],
        };
        let passes = self.passes;
        let Some(res) = self.resources.as_mut() else {
            log::warn!("Bloom applied before init");
            return Ok(());
        };

        if self.written != Some(params) {
            backend.write_buffer(res.params_buffer, 0, bytemuck::bytes_of(&params));
            self.written = Some(params);
        }

        let input_group = res.inputs.get_or_create(backend, fullscreen, input)?;
        fullscreen_pass(
            backend,
            "Bloom Extract",
            res.ping.view,
            res.extract_pipeline,
            &[input_group, res.params_group],
        );
        for _ in 0..passes {
            fullscreen_pass(
                backend,
                "Bloom Blur Horizontal",
                res.pong.view,
                res.blur_pipeline,
                &[res.ping_group, res.horizontal_group],
            );
            fullscreen_pass(
                backend,
                "Bloom Blur Vertical",
                res.ping.view,
                res.blur_pipeline,
                &[res.pong_group, res.vertical_group],
            );
        }
        fullscreen_pass(
            backend,
            "Bloom Composite",
            res.output.view,
            res.composite_pipeline,
            &[input_group, res.ping_group],
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn run(bloom: &mut BloomEffect, backend: &mut HeadlessBackend, fullscreen: &Fullscreen, input: &RenderTarget) {
        backend.begin_frame().unwrap();
        bloom.clear(backend);
        bloom.apply(backend, fullscreen, input.view, &FrameTime::default()).unwrap();
        backend.end_frame().unwrap();
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut bloom = BloomEffect::new();
        bloom.set_threshold(5.0);
        bloom.set_passes(0);
        assert_eq!(bloom.threshold(), 1.0);
        assert_eq!(bloom.passes(), 1);
        bloom.set_passes(99);
        assert_eq!(bloom.passes(), MAX_BLOOM_PASSES);
    }

    #[test]
    fn test_pass_count_follows_parameter() {
        let mut backend = HeadlessBackend::new(32, 32);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let input = RenderTarget::new(&mut backend, "input", 32, 32, TextureFormat::Rgba16Float).unwrap();
        let mut bloom = BloomEffect::new();
        bloom.init(&mut backend, &fullscreen, 32, 32).unwrap();

        bloom.set_passes(3);
        run(&mut bloom, &mut backend, &fullscreen, &input);

        let blurs = backend
            .pass_labels()
            .iter()
            .filter(|l| l.starts_with("Bloom Blur"))
            .count();
        assert_eq!(blurs, 6);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn test_threshold_changes_output() {
        let mut backend = HeadlessBackend::new(32, 32);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let input = RenderTarget::new(&mut backend, "input", 32, 32, TextureFormat::Rgba16Float).unwrap();
        let mut bloom = BloomEffect::new();
        bloom.init(&mut backend, &fullscreen, 32, 32).unwrap();
        let output = bloom.output().unwrap();

        run(&mut bloom, &mut backend, &fullscreen, &input);
        let first = backend.view_digest(output);
        run(&mut bloom, &mut backend, &fullscreen, &input);
        assert_eq!(backend.view_digest(output), first);

        bloom.set_threshold(0.9);
        run(&mut bloom, &mut backend, &fullscreen, &input);
        assert_ne!(backend.view_digest(output), first);
    }
}
