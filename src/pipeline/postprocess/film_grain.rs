//! Animated film grain

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{clear_target, fullscreen_pass, Fullscreen, RenderTarget, TextureGroupCache};
use crate::pipeline::postprocess::{EffectKey, PostEffect};
use crate::time::FrameTime;
use bytemuck::{Pod, Zeroable};
use std::any::Any;

pub const FILM_GRAIN_SHADER: &str = r#"
struct GrainParams {
    strength: f32,
    time: f32,
    width: f32,
    height: f32,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> params: GrainParams;

fn hash(p: vec2<f32>) -> f32 {
    let q = fract(p * vec2<f32>(123.34, 456.21));
    let r = q + dot(q, q + 45.32);
    return fract(r.x * r.y);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(source_texture, source_sampler, input.uv);
    let pixel = floor(input.uv * vec2<f32>(params.width, params.height));
    let noise = hash(pixel + vec2<f32>(params.time * 60.0, params.time * 37.0)) - 0.5;
    let grain = noise * params.strength / 100.0;
    return vec4<f32>(color.rgb + vec3<f32>(grain), color.a);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct GrainParams {
    strength: f32,
    time: f32,
    width: f32,
    height: f32,
}

struct GrainResources {
    output: RenderTarget,
    pipeline: RenderPipelineHandle,
    params_buffer: BufferHandle,
    params_group: BindGroupHandle,
    inputs: TextureGroupCache,
}

/// Noise added on top of the image, reseeded by elapsed time each frame
pub struct FilmGrainEffect {
    strength: f32,
    resources: Option<GrainResources>,
}

impl FilmGrainEffect {
    pub fn new() -> Self {
        Self {
            strength: 8.0,
            resources: None,
        }
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Grain amplitude, clamped to 0..=20
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.clamp(0.0, 20.0);
    }
}

impl Default for FilmGrainEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostEffect for FilmGrainEffect {
    fn key(&self) -> EffectKey {
        EffectKey::FilmGrain
    }

    fn init(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        let output = RenderTarget::new(backend, "Film Grain Output", width, height, TextureFormat::Rgba16Float)?;
        let pipeline = fullscreen.create_pipeline(
            backend,
            "Film Grain",
            FILM_GRAIN_SHADER,
            vec![fullscreen.texture_layout, fullscreen.uniform_layout],
            TextureFormat::Rgba16Float,
        )?;
        let params_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "Film Grain Params",
            std::mem::size_of::<GrainParams>() as u64,
        ))?;
        let params_group = fullscreen.uniform_group(backend, params_buffer)?;

        self.resources = Some(GrainResources {
            output,
            pipeline,
            params_buffer,
            params_group,
            inputs: TextureGroupCache::default(),
        });
        Ok(())
    }

    fn clear(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(res) = &self.resources {
            clear_target(backend, "Film Grain Clear", res.output.view, [0.0; 4]);
        }
    }

    fn apply(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        input: TextureViewHandle,
        time: &FrameTime,
    ) -> PipelineResult<()> {
        let strength = self.strength;
        let Some(res) = self.resources.as_mut() else {
            log::warn!("Film grain applied before init");
            return Ok(());
        };

        let params = GrainParams {
            strength,
            time: time.elapsed,
            width: res.output.width as f32,
            height: res.output.height as f32,
        };
        backend.write_buffer(res.params_buffer, 0, bytemuck::bytes_of(&params));

        let input_group = res.inputs.get_or_create(backend, fullscreen, input)?;
        fullscreen_pass(
            backend,
            "Film Grain",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_grain_animates_with_time() {
        let mut backend = HeadlessBackend::new(16, 16);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let input = RenderTarget::new(&mut backend, "input", 16, 16, TextureFormat::Rgba16Float).unwrap();
        let mut grain = FilmGrainEffect::new();
        grain.init(&mut backend, &fullscreen, 16, 16).unwrap();
        let output = grain.output().unwrap();

        let mut digests = Vec::new();
        for elapsed in [0.5, 0.5, 1.0] {
            backend.begin_frame().unwrap();
            grain
                .apply(&mut backend, &fullscreen, input.view, &FrameTime::new(0.016, elapsed))
                .unwrap();
            backend.end_frame().unwrap();
            digests.push(backend.view_digest(output));
        }
        assert_eq!(digests[0], digests[1]);
        assert_ne!(digests[1], digests[2]);
    }

    #[test]
    fn test_strength_clamped() {
        let mut grain = FilmGrainEffect::new();
        grain.set_strength(-3.0);
        assert_eq!(grain.strength(), 0.0);
        grain.set_strength(50.0);
        assert_eq!(grain.strength(), 20.0);
    }
}
