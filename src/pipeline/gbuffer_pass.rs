//! G-Buffer generation pass for deferred rendering
//!
//! Renders the sorted render queue into four color targets plus depth:
//! - Albedo (base color)
//! - World-space normal
//! - Specular: R = intensity, G = shininess / 255
//! - World-space position, w = 0 where nothing was drawn

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::RenderTarget;
use crate::pipeline::gpu_resources::{GpuResources, SharedLayouts};
use crate::render_queue::RenderQueue;
use crate::resources::{MaterialId, MeshId, Shader, ShaderId, ShaderRegistry};
use std::collections::HashMap;

pub const GBUFFER_ALBEDO: usize = 0;
pub const GBUFFER_NORMAL: usize = 1;
pub const GBUFFER_SPECULAR: usize = 2;
pub const GBUFFER_POSITION: usize = 3;

const GBUFFER_LAYOUT: [(&str, TextureFormat); 4] = [
    ("GBuffer Albedo", TextureFormat::Rgba8Unorm),
    ("GBuffer Normal", TextureFormat::Rgba16Float),
    ("GBuffer Specular", TextureFormat::Rgba8Unorm),
    ("GBuffer Position", TextureFormat::Rgba16Float),
];

/// Bind counts of one geometry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryStats {
    pub draws: usize,
    pub pipeline_binds: usize,
    pub material_binds: usize,
}

/// G-Buffer generation pass
pub struct GBufferPass {
    targets: [RenderTarget; 4],
    depth: RenderTarget,
    pipelines: HashMap<ShaderId, RenderPipelineHandle>,
    clear_color: [f32; 4],
}

impl GBufferPass {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        width: u32,
        height: u32,
        clear_color: [f32; 4],
    ) -> PipelineResult<Self> {
        let mut target = |index: usize| {
            let (label, format) = GBUFFER_LAYOUT[index];
            RenderTarget::new(backend, label, width, height, format)
        };
        let targets = [target(0)?, target(1)?, target(2)?, target(3)?];
        let depth = RenderTarget::new(backend, "GBuffer Depth", width, height, TextureFormat::Depth32Float)?;

        Ok(Self {
            targets,
            depth,
            pipelines: HashMap::new(),
            clear_color,
        })
    }

    pub fn target(&self, index: usize) -> Option<&RenderTarget> {
        self.targets.get(index)
    }

    pub fn targets(&self) -> &[RenderTarget; 4] {
        &self.targets
    }

    pub fn depth(&self) -> &RenderTarget {
        &self.depth
    }

    /// Create a pipeline for every registered shader that lacks one
    pub fn prepare_shaders(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        shaders: &ShaderRegistry,
        gpu: &mut GpuResources,
        layouts: &SharedLayouts,
    ) -> PipelineResult<()> {
        for shader in shaders.iter() {
            if self.pipelines.contains_key(&shader.id) {
                continue;
            }
            let pipeline = self.create_pipeline(backend, shader, gpu, layouts)?;
            self.pipelines.insert(shader.id, pipeline);
        }
        Ok(())
    }

    fn create_pipeline(
        &self,
        backend: &mut dyn GraphicsBackend,
        shader: &Shader,
        gpu: &mut GpuResources,
        layouts: &SharedLayouts,
    ) -> PipelineResult<RenderPipelineHandle> {
        let material_layout = gpu.material_layout(backend, shader)?;
        log::debug!("Creating geometry pipeline for shader '{}'", shader.name);

        Ok(backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(format!("GBuffer {}", shader.name)),
            shader_source: shader.source.clone(),
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![layouts.frame, layouts.object, material_layout, layouts.shadow],
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                bias: DepthBias::default(),
            }),
            color_targets: GBUFFER_LAYOUT
                .iter()
                .map(|(_, format)| ColorTargetState::replace(*format))
                .collect(),
        })?)
    }

    /// Draw the queue in order, rebinding pipeline and material only on change
    pub fn execute(
        &self,
        backend: &mut dyn GraphicsBackend,
        queue: &RenderQueue,
        gpu: &GpuResources,
        frame_group: BindGroupHandle,
        shadow_group: BindGroupHandle,
        viewport: (u32, u32),
    ) -> GeometryStats {
        let mut color_attachments = vec![ColorAttachment::clear(self.targets[GBUFFER_ALBEDO].view, self.clear_color)];
        color_attachments.extend(
            self.targets[1..]
                .iter()
                .map(|t| ColorAttachment::clear(t.view, [0.0; 4])),
        );
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("GBuffer Pass".into()),
            color_attachments,
            depth_stencil_attachment: Some(DepthStencilAttachment::clear(self.depth.view, 1.0)),
        });
        backend.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);

        let mut stats = GeometryStats::default();
        let mut current_shader: Option<ShaderId> = None;
        let mut current_material: Option<MaterialId> = None;
        let mut current_mesh: Option<MeshId> = None;

        for (slot, item) in queue.slots() {
            let Some(&pipeline) = self.pipelines.get(&item.shader) else {
                log::warn!("No geometry pipeline for {:?}, skipping {:?}", item.shader, item.entity);
                continue;
            };
            let (Some(mesh), Some(material), Some(object)) =
                (gpu.mesh(item.mesh), gpu.material(item.material), gpu.object(slot))
            else {
                continue;
            };

            if current_shader != Some(item.shader) {
                backend.set_render_pipeline(pipeline);
                if current_shader.is_none() {
                    backend.set_bind_group(0, frame_group);
                    backend.set_bind_group(3, shadow_group);
                }
                current_shader = Some(item.shader);
                current_material = None;
                stats.pipeline_binds += 1;
            }
            if current_material != Some(item.material) {
                backend.set_bind_group(2, material.bind_group);
                current_material = Some(item.material);
                stats.material_binds += 1;
            }
            backend.set_bind_group(1, object.bind_group);
            if current_mesh != Some(item.mesh) {
                backend.set_vertex_buffer(0, mesh.vertex_buffer, 0);
                backend.set_index_buffer(mesh.index_buffer, 0, IndexFormat::Uint32);
                current_mesh = Some(item.mesh);
            }
            backend.draw_indexed(0..mesh.index_count, 0, 0..1);
            stats.draws += 1;
        }

        backend.end_render_pass();
        stats
    }
}
