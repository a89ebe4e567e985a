//! Full-screen triangle helpers shared by the lighting pass and post effects

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::resources::validate_wgsl;
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;

/// Common fullscreen triangle vertex stage
pub const FULLSCREEN_VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Generate fullscreen triangle
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);

    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);

    return output;
}
"#;

/// Copies a texture region onto the screen
pub const BLIT_SHADER: &str = r#"
struct BlitParams {
    uv_scale: vec4<f32>,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(1) @binding(0) var<uniform> params: BlitParams;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(source_texture, source_sampler, input.uv * params.uv_scale.xy);
    return vec4<f32>(color.rgb, 1.0);
}
"#;

/// Assemble a fullscreen module from the shared vertex stage and a fragment body
pub fn fullscreen_source(fragment: &str) -> String {
    format!("{}\n{}", FULLSCREEN_VERTEX_SHADER, fragment)
}

/// Samplers and layouts every fullscreen pass binds
pub struct Fullscreen {
    pub linear_sampler: SamplerHandle,
    /// binding 0 filterable texture, binding 1 filtering sampler
    pub texture_layout: BindGroupLayoutHandle,
    /// binding 0 fragment uniform
    pub uniform_layout: BindGroupLayoutHandle,
}

impl Fullscreen {
    pub fn new(backend: &mut dyn GraphicsBackend) -> PipelineResult<Self> {
        let linear_sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Fullscreen Sampler".into()),
            ..Default::default()
        })?;
        let texture_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Float { filterable: true }),
            BindGroupLayoutEntry::sampler(1, false),
        ])?;
        let uniform_layout =
            backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::FRAGMENT)])?;

        Ok(Self {
            linear_sampler,
            texture_layout,
            uniform_layout,
        })
    }

    /// Validate and create a fullscreen pipeline writing one color target
    pub fn create_pipeline(
        &self,
        backend: &mut dyn GraphicsBackend,
        label: &str,
        fragment: &str,
        bind_group_layouts: Vec<BindGroupLayoutHandle>,
        format: TextureFormat,
    ) -> PipelineResult<RenderPipelineHandle> {
        let source = fullscreen_source(fragment);
        validate_wgsl(label, &source, &["vs_main", "fs_main"])?;

        Ok(backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label.to_string()),
            shader_source: source,
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![],
            bind_group_layouts,
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState::replace(format)],
        })?)
    }

    /// Bind group sampling `view` through the linear sampler
    pub fn texture_group(
        &self,
        backend: &mut dyn GraphicsBackend,
        view: TextureViewHandle,
    ) -> PipelineResult<BindGroupHandle> {
        Ok(backend.create_bind_group(
            self.texture_layout,
            &[
                (0, BindGroupEntry::Texture(view)),
                (1, BindGroupEntry::Sampler(self.linear_sampler)),
            ],
        )?)
    }

    /// Bind group exposing a uniform buffer at binding 0
    pub fn uniform_group(
        &self,
        backend: &mut dyn GraphicsBackend,
        buffer: BufferHandle,
    ) -> PipelineResult<BindGroupHandle> {
        Ok(backend.create_bind_group(self.uniform_layout, &[(0, BindGroupEntry::buffer(buffer))])?)
    }
}

/// Offscreen color target with its view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> PipelineResult<Self> {
        let texture = backend.create_texture(&TextureDescriptor::render_target(label, width, height, format))?;
        let view = backend.create_texture_view(texture)?;
        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    pub fn destroy(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture(self.texture);
    }
}

/// Lazily created bind groups, one per sampled view
#[derive(Debug, Default)]
pub struct TextureGroupCache {
    groups: HashMap<TextureViewHandle, BindGroupHandle>,
}

impl TextureGroupCache {
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        view: TextureViewHandle,
    ) -> PipelineResult<BindGroupHandle> {
        if let Some(group) = self.groups.get(&view) {
            return Ok(*group);
        }
        let group = fullscreen.texture_group(backend, view)?;
        self.groups.insert(view, group);
        Ok(group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Clear a color target without drawing
pub fn clear_target(backend: &mut dyn GraphicsBackend, label: &str, view: TextureViewHandle, color: [f32; 4]) {
    backend.begin_render_pass(&RenderPassDescriptor {
        label: Some(label.to_string()),
        color_attachments: vec![ColorAttachment::clear(view, color)],
        depth_stencil_attachment: None,
    });
    backend.end_render_pass();
}

/// Run one fullscreen triangle into `target`
pub fn fullscreen_pass(
    backend: &mut dyn GraphicsBackend,
    label: &str,
    target: TextureViewHandle,
    pipeline: RenderPipelineHandle,
    bind_groups: &[BindGroupHandle],
) {
    backend.begin_render_pass(&RenderPassDescriptor {
        label: Some(label.to_string()),
        color_attachments: vec![ColorAttachment::clear(target, [0.0, 0.0, 0.0, 1.0])],
        depth_stencil_attachment: None,
    });
    backend.set_render_pipeline(pipeline);
    for (index, group) in bind_groups.iter().enumerate() {
        backend.set_bind_group(index as u32, *group);
    }
    backend.draw(0..3, 0..1);
    backend.end_render_pass();
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct BlitParams {
    uv_scale: [f32; 4],
}

/// Presents offscreen targets on the swapchain
///
/// Offscreen targets keep their initial size, so only the region the
/// geometry pass rendered into (the viewport) is stretched over the screen.
pub struct ScreenBlit {
    pipeline: RenderPipelineHandle,
    params_buffer: BufferHandle,
    params_group: BindGroupHandle,
    params: BlitParams,
    sources: TextureGroupCache,
}

impl ScreenBlit {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        screen_format: TextureFormat,
    ) -> PipelineResult<Self> {
        let pipeline = fullscreen.create_pipeline(
            backend,
            "Screen Blit",
            BLIT_SHADER,
            vec![fullscreen.texture_layout, fullscreen.uniform_layout],
            screen_format,
        )?;
        let params = BlitParams {
            uv_scale: [1.0, 1.0, 0.0, 0.0],
        };
        let params_buffer = backend.create_buffer_init(
            &BufferDescriptor::uniform("Blit Params", std::mem::size_of::<BlitParams>() as u64),
            bytemuck::bytes_of(&params),
        )?;
        let params_group = fullscreen.uniform_group(backend, params_buffer)?;

        Ok(Self {
            pipeline,
            params_buffer,
            params_group,
            params,
            sources: TextureGroupCache::default(),
        })
    }

    /// Portion of the source texture shown on screen, written before any pass
    pub fn set_region(&mut self, backend: &mut dyn GraphicsBackend, u: f32, v: f32) {
        let params = BlitParams {
            uv_scale: [u, v, 0.0, 0.0],
        };
        if params != self.params {
            self.params = params;
            backend.write_buffer(self.params_buffer, 0, bytemuck::bytes_of(&params));
        }
    }

    /// Draw `source` over the whole screen
    pub fn blit(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        label: &str,
        source: TextureViewHandle,
        screen: TextureViewHandle,
    ) -> PipelineResult<()> {
        let source_group = self.sources.get_or_create(backend, fullscreen, source)?;
        fullscreen_pass(backend, label, screen, self.pipeline, &[source_group, self.params_group]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_blit_caches_source_groups() {
        let mut backend = HeadlessBackend::new(64, 64);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let mut blit = ScreenBlit::new(&mut backend, &fullscreen, TextureFormat::Bgra8UnormSrgb).unwrap();
        let source = RenderTarget::new(&mut backend, "src", 64, 64, TextureFormat::Rgba16Float).unwrap();

        for _ in 0..3 {
            let frame = backend.begin_frame().unwrap();
            blit.blit(&mut backend, &fullscreen, "Present", source.view, frame.swapchain_view)
                .unwrap();
            backend.end_frame().unwrap();
        }

        assert_eq!(blit.sources.len(), 1);
        assert!(backend.violations().is_empty());
        assert_eq!(backend.pass("Present").unwrap().draw_count(), 1);
    }

    #[test]
    fn test_region_changes_screen_digest() {
        let mut backend = HeadlessBackend::new(64, 64);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let mut blit = ScreenBlit::new(&mut backend, &fullscreen, TextureFormat::Bgra8UnormSrgb).unwrap();
        let source = RenderTarget::new(&mut backend, "src", 64, 64, TextureFormat::Rgba16Float).unwrap();
        let swapchain = backend.swapchain_texture();

        let mut digests = Vec::new();
        for region in [1.0, 0.5] {
            blit.set_region(&mut backend, region, region);
            let frame = backend.begin_frame().unwrap();
            blit.blit(&mut backend, &fullscreen, "Present", source.view, frame.swapchain_view)
                .unwrap();
            backend.end_frame().unwrap();
            digests.push(backend.texture_digest(swapchain));
        }
        assert_ne!(digests[0], digests[1]);
    }
}
