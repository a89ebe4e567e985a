//! Greyscale and sepia colour filters

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{clear_target, fullscreen_pass, Fullscreen, RenderTarget, TextureGroupCache};
use crate::pipeline::postprocess::{EffectKey, PostEffect};
use crate::time::FrameTime;
use bytemuck::{Pod, Zeroable};
use std::any::Any;

pub const COLOR_FILTER_SHADER: &str = r#"
struct FilterParams {
    intensity: f32,
    // 0 greyscale, 1 sepia
    mode: f32,
    _pad0: f32,
    _pad1: f32,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> params: FilterParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(source_texture, source_sampler, input.uv);
    let luminance = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    var filtered = vec3<f32>(luminance);
    if (params.mode > 0.5) {
        filtered = vec3<f32>(
            dot(color.rgb, vec3<f32>(0.393, 0.769, 0.189)),
            dot(color.rgb, vec3<f32>(0.349, 0.686, 0.168)),
            dot(color.rgb, vec3<f32>(0.272, 0.534, 0.131)),
        );
    }
    return vec4<f32>(mix(color.rgb, filtered, params.intensity), color.a);
}
"#;

/// Which colour transform the filter applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFilter {
    Greyscale,
    Sepia,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct FilterParams {
    intensity: f32,
    mode: f32,
    _pad: [f32; 2],
}

struct FilterResources {
    output: RenderTarget,
    pipeline: RenderPipelineHandle,
    params_buffer: BufferHandle,
    params_group: BindGroupHandle,
    written: Option<FilterParams>,
    inputs: TextureGroupCache,
}

/// Blend between the input and its filtered colour
pub struct ColorFilterEffect {
    filter: ColorFilter,
    intensity: f32,
    resources: Option<FilterResources>,
}

impl ColorFilterEffect {
    pub fn new(filter: ColorFilter) -> Self {
        Self {
            filter,
            intensity: 1.0,
            resources: None,
        }
    }

    pub fn filter(&self) -> ColorFilter {
        self.filter
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(0.0, 1.0);
    }

    fn label(&self) -> &'static str {
        self.key().name()
    }
}

impl PostEffect for ColorFilterEffect {
    fn key(&self) -> EffectKey {
        match self.filter {
            ColorFilter::Greyscale => EffectKey::Greyscale,
            ColorFilter::Sepia => EffectKey::Sepia,
        }
    }

    fn init(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        width: u32,
        height: u32,
    ) -> PipelineResult<()> {
        let label = self.label();
        let output = RenderTarget::new(
            backend,
            &format!("{} Output", label),
            width,
            height,
            TextureFormat::Rgba16Float,
        )?;
        let pipeline = fullscreen.create_pipeline(
            backend,
            label,
            COLOR_FILTER_SHADER,
            vec![fullscreen.texture_layout, fullscreen.uniform_layout],
            TextureFormat::Rgba16Float,
        )?;
        let params_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            &format!("{} Params", label),
            std::mem::size_of::<FilterParams>() as u64,
        ))?;
        let params_group = fullscreen.uniform_group(backend, params_buffer)?;

        self.resources = Some(FilterResources {
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
        let label = format!("{} Clear", self.label());
        if let Some(res) = &self.resources {
            clear_target(backend, &label, res.output.view, [0.0; 4]);
        }
    }

    fn apply(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        input: TextureViewHandle,
        _time: &FrameTime,
    ) -> PipelineResult<()> {
        let label = self.label();
        let params = FilterParams {
            intensity: self.intensity,
            mode: match self.filter {
                ColorFilter::Greyscale => 0.0,
                ColorFilter::Sepia => 1.0,
            },
            _pad: [0.0; 2],
        };
        let Some(res) = self.resources.as_mut() else {
            log::warn!("{} applied before init", label);
            return Ok(());
        };

        if res.written != Some(params) {
            backend.write_buffer(res.params_buffer, 0, bytemuck::bytes_of(&params));
            res.written = Some(params);
        }

        let input_group = res.inputs.get_or_create(backend, fullscreen, input)?;
        fullscreen_pass(
            backend,
            label,
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

    #[test]
    fn test_key_follows_filter() {
        assert_eq!(ColorFilterEffect::new(ColorFilter::Greyscale).key(), EffectKey::Greyscale);
        assert_eq!(ColorFilterEffect::new(ColorFilter::Sepia).key(), EffectKey::Sepia);
    }
}
