//! Shadow depth pass
//!
//! Renders every shadow-casting item from the directional light into a square
//! depth texture. Later passes sample it through a comparison sampler.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::gpu_resources::{GpuResources, SharedLayouts};
use crate::render_queue::RenderQueue;
use crate::resources::validate_wgsl;
use crate::ShadowConfig;

/// Depth-only shader projecting through the frame's light-space matrix
pub const SHADOW_SHADER: &str = r#"
struct FrameUniform {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    light_space: mat4x4<f32>,
    camera_position: vec4<f32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniform;
@group(1) @binding(0) var<uniform> object: ObjectUniform;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.light_space * object.model * vec4<f32>(position, 1.0);
}
"#;

const SHADOW_DEPTH_BIAS: DepthBias = DepthBias {
    constant: 2,
    slope_scale: 2.0,
};

/// Directional shadow map pass
pub struct ShadowPass {
    texture: TextureHandle,
    view: TextureViewHandle,
    pipeline: RenderPipelineHandle,
    sample_group: BindGroupHandle,
    resolution: u32,
}

impl ShadowPass {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        layouts: &SharedLayouts,
        config: &ShadowConfig,
    ) -> PipelineResult<Self> {
        let resolution = config.resolution.max(1);
        let texture = backend.create_texture(&TextureDescriptor::render_target(
            "Shadow Map",
            resolution,
            resolution,
            TextureFormat::Depth32Float,
        ))?;
        let view = backend.create_texture_view(texture)?;
        let sampler = backend.create_sampler(&SamplerDescriptor::shadow("Shadow Sampler"))?;
        let sample_group = backend.create_bind_group(
            layouts.shadow,
            &[(0, BindGroupEntry::Texture(view)), (1, BindGroupEntry::Sampler(sampler))],
        )?;

        validate_wgsl("shadow", SHADOW_SHADER, &["vs_main"])?;
        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Shadow Pipeline".into()),
            shader_source: SHADOW_SHADER.to_string(),
            vertex_entry: "vs_main".into(),
            fragment_entry: None,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.frame, layouts.object],
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                bias: SHADOW_DEPTH_BIAS,
            }),
            color_targets: vec![],
        })?;

        log::info!("Shadow map created at {}x{}", resolution, resolution);

        Ok(Self {
            texture,
            view,
            pipeline,
            sample_group,
            resolution,
        })
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Shadow map and comparison sampler, for the geometry and lighting passes
    pub fn sample_group(&self) -> BindGroupHandle {
        self.sample_group
    }

    /// Clear to the far plane and draw every caster; returns the draw count
    pub fn execute(
        &self,
        backend: &mut dyn GraphicsBackend,
        queue: &RenderQueue,
        gpu: &GpuResources,
        frame_group: BindGroupHandle,
    ) -> usize {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow Pass".into()),
            color_attachments: vec![],
            depth_stencil_attachment: Some(DepthStencilAttachment::clear(self.view, 1.0)),
        });

        let mut draws = 0;
        let mut bound = false;
        for (slot, item) in queue.slots().filter(|(_, item)| item.cast_shadows) {
            let (Some(mesh), Some(object)) = (gpu.mesh(item.mesh), gpu.object(slot)) else {
                continue;
            };
            if !bound {
                backend.set_render_pipeline(self.pipeline);
                backend.set_bind_group(0, frame_group);
                let size = self.resolution as f32;
                backend.set_viewport(0.0, 0.0, size, size, 0.0, 1.0);
                bound = true;
            }
            backend.set_bind_group(1, object.bind_group);
            backend.set_vertex_buffer(0, mesh.vertex_buffer, 0);
            backend.set_index_buffer(mesh.index_buffer, 0, IndexFormat::Uint32);
            backend.draw_indexed(0..mesh.index_count, 0, 0..1);
            draws += 1;
        }

        backend.end_render_pass();
        draws
    }
}
