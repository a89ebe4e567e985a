//! Deferred lighting pass
//!
//! A fullscreen triangle reads the four G-buffer targets texel by texel and
//! writes lit color into the illumination buffer. Shading is Blinn-Phong for
//! the single directional light, attenuated by a 3x3 PCF lookup into the
//! shadow map. Background texels (position w == 0) pass their albedo through.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{clear_target, fullscreen_pass, Fullscreen, RenderTarget};
use crate::pipeline::gbuffer_pass::GBufferPass;
use crate::pipeline::gpu_resources::SharedLayouts;
use crate::scene::{LightState, LightUniform};

pub const LIGHTING_SHADER: &str = r#"
struct LightUniform {
    direction: vec4<f32>,
    color: vec4<f32>,
    light_space: mat4x4<f32>,
    camera_position: vec4<f32>,
}

@group(0) @binding(0) var<uniform> light: LightUniform;
@group(1) @binding(0) var g_albedo: texture_2d<f32>;
@group(1) @binding(1) var g_normal: texture_2d<f32>;
@group(1) @binding(2) var g_specular: texture_2d<f32>;
@group(1) @binding(3) var g_position: texture_2d<f32>;
@group(2) @binding(0) var shadow_map: texture_depth_2d;
@group(2) @binding(1) var shadow_sampler: sampler_comparison;

fn shadow_visibility(world_position: vec3<f32>) -> f32 {
    let clip = light.light_space * vec4<f32>(world_position, 1.0);
    let ndc = clip.xyz / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);

    // Outside the light frustum counts as lit
    if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z < 0.0 || ndc.z > 1.0) {
        return 1.0;
    }

    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var visible = 0.0;
    for (var x = -1; x <= 1; x = x + 1) {
        for (var y = -1; y <= 1; y = y + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            visible = visible + textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z);
        }
    }
    return visible / 9.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let coord = vec2<i32>(floor(input.position.xy));
    let albedo = textureLoad(g_albedo, coord, 0);
    let position = textureLoad(g_position, coord, 0);
    if (position.w == 0.0) {
        return albedo;
    }

    let normal = normalize(textureLoad(g_normal, coord, 0).xyz);
    let specular_sample = textureLoad(g_specular, coord, 0);
    let to_light = normalize(-light.direction.xyz);
    let to_eye = normalize(light.camera_position.xyz - position.xyz);
    let halfway = normalize(to_light + to_eye);

    let diffuse = max(dot(normal, to_light), 0.0);
    let shininess = max(specular_sample.g * 255.0, 1.0);
    var specular = 0.0;
    if (diffuse > 0.0) {
        specular = pow(max(dot(normal, halfway), 0.0), shininess) * specular_sample.r;
    }

    let visibility = shadow_visibility(position.xyz);
    let ambient = light.color.w;
    let lit = albedo.rgb * light.color.rgb * (ambient + diffuse * visibility)
        + light.color.rgb * specular * visibility;
    return vec4<f32>(lit, albedo.a);
}
"#;

/// Lighting pass writing the illumination buffer
pub struct LightingPass {
    target: RenderTarget,
    pipeline: RenderPipelineHandle,
    light_buffer: BufferHandle,
    light_group: BindGroupHandle,
    gbuffer_group: BindGroupHandle,
    clear_color: [f32; 4],
}

impl LightingPass {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        layouts: &SharedLayouts,
        gbuffer: &GBufferPass,
        clear_color: [f32; 4],
    ) -> PipelineResult<Self> {
        let (width, height) = (gbuffer.depth().width, gbuffer.depth().height);
        let target = RenderTarget::new(backend, "Illumination Buffer", width, height, TextureFormat::Rgba16Float)?;

        let gbuffer_entries: Vec<_> = (0..4)
            .map(|binding| BindGroupLayoutEntry::texture(binding, TextureSampleType::Float { filterable: false }))
            .collect();
        let gbuffer_layout = backend.create_bind_group_layout(&gbuffer_entries)?;
        let gbuffer_group = backend.create_bind_group(
            gbuffer_layout,
            &gbuffer
                .targets()
                .iter()
                .enumerate()
                .map(|(binding, t)| (binding as u32, BindGroupEntry::Texture(t.view)))
                .collect::<Vec<_>>(),
        )?;

        let light_buffer = backend.create_buffer(&BufferDescriptor::uniform(
            "Light Uniform",
            std::mem::size_of::<LightUniform>() as u64,
        ))?;
        let light_group = fullscreen.uniform_group(backend, light_buffer)?;

        let pipeline = fullscreen.create_pipeline(
            backend,
            "Lighting",
            LIGHTING_SHADER,
            vec![fullscreen.uniform_layout, gbuffer_layout, layouts.shadow],
            TextureFormat::Rgba16Float,
        )?;

        Ok(Self {
            target,
            pipeline,
            light_buffer,
            light_group,
            gbuffer_group,
            clear_color,
        })
    }

    /// The illumination buffer
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Light the G-buffer; without a light the buffer is only cleared
    pub fn execute(
        &self,
        backend: &mut dyn GraphicsBackend,
        light: Option<&LightState>,
        shadow_group: BindGroupHandle,
    ) -> bool {
        let Some(light) = light else {
            log::warn!("Scene has no directional light, illumination buffer left clear");
            clear_target(backend, "Lighting Pass", self.target.view, self.clear_color);
            return false;
        };

        backend.write_buffer(self.light_buffer, 0, bytemuck::bytes_of(&light.uniform()));
        fullscreen_pass(
            backend,
            "Lighting Pass",
            self.target.view,
            self.pipeline,
            &[self.light_group, self.gbuffer_group, shadow_group],
        );
        true
    }
}
