//! Headless recording backend.
//!
//! This backend performs no GPU work. It records every render pass of the
//! current frame and derives a deterministic content digest for each texture
//! from what the pass would have drawn into it: the load operation, the
//! pipelines, the bytes of every bound buffer and the digests of every bound
//! input texture. Two frames that would rasterize the same image therefore
//! produce the same digests, which lets the pass ordering and resource
//! plumbing be tested without hardware.
//!
//! Misuse of the command stream (nested passes, draws outside a pass,
//! sampling a texture the pass is writing, attachments of mismatched size)
//! is not fatal here; it is collected in [`HeadlessBackend::violations`].

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// A command recorded inside a render pass
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer { slot: u32, buffer: BufferHandle },
    SetIndexBuffer { buffer: BufferHandle, format: IndexFormat },
    SetViewport { width: f32, height: f32 },
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32>, instances: Range<u32> },
}

/// A render pass as recorded during the current frame
#[derive(Debug, Clone)]
pub struct RecordedPass {
    pub label: Option<String>,
    pub color_targets: Vec<TextureHandle>,
    pub color_loads: Vec<LoadOp>,
    pub depth_target: Option<TextureHandle>,
    pub depth_clear: Option<f32>,
    pub commands: Vec<RecordedCommand>,
}

impl RecordedPass {
    /// Number of draw calls, indexed or not
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }))
            .count()
    }

    /// Number of pipeline binds
    pub fn pipeline_switches(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetPipeline(_)))
            .count()
    }

    /// Number of binds at a given bind group index
    pub fn bind_group_switches(&self, index: u32) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::SetBindGroup { index: i, .. } if *i == index))
            .count()
    }

    /// Bind groups bound at `index`, in recording order
    pub fn bound_groups(&self, index: u32) -> Vec<BindGroupHandle> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetBindGroup { index: i, bind_group } if *i == index => {
                    Some(*bind_group)
                }
                _ => None,
            })
            .collect()
    }
}

struct OpenPass {
    pass: RecordedPass,
    hasher: DefaultHasher,
    pipeline_bound: bool,
}

/// Backend that records instead of rendering
pub struct HeadlessBackend {
    surface_width: u32,
    surface_height: u32,
    frame_index: u64,
    in_frame: bool,

    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_views: HashMap<u64, u64>, // view -> texture
    samplers: HashMap<u64, SamplerDescriptor>,
    bind_groups: HashMap<u64, Vec<(u32, BindGroupEntry)>>,
    pipelines: HashMap<u64, u64>, // pipeline -> descriptor digest
    digests: HashMap<u64, u64>,

    swapchain_texture: TextureHandle,
    swapchain_view: TextureViewHandle,

    next_id: u64,
    open_pass: Option<OpenPass>,
    frame_passes: Vec<RecordedPass>,
    violations: Vec<String>,
}

impl HeadlessBackend {
    /// Create a backend whose surface reports the given size
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = Self {
            surface_width: width.max(1),
            surface_height: height.max(1),
            frame_index: 0,
            in_frame: false,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
            digests: HashMap::new(),
            swapchain_texture: TextureHandle(0),
            swapchain_view: TextureViewHandle(0),
            next_id: 1,
            open_pass: None,
            frame_passes: Vec::new(),
            violations: Vec::new(),
        };

        let texture_id = backend.allocate_id();
        backend.textures.insert(
            texture_id,
            TextureDescriptor {
                label: Some("Swapchain".to_string()),
                width: backend.surface_width,
                height: backend.surface_height,
                format: TextureFormat::Bgra8UnormSrgb,
                usage: TextureUsage::RENDER_ATTACHMENT,
            },
        );
        let view_id = backend.allocate_id();
        backend.texture_views.insert(view_id, texture_id);
        backend.swapchain_texture = TextureHandle(texture_id);
        backend.swapchain_view = TextureViewHandle(view_id);
        backend
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn violation(&mut self, message: String) {
        log::warn!("HeadlessBackend: {}", message);
        self.violations.push(message);
    }

    /// Frames completed so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Passes recorded since the last `begin_frame`, in submission order
    pub fn frame_passes(&self) -> &[RecordedPass] {
        &self.frame_passes
    }

    /// First recorded pass of the current frame with this label
    pub fn pass(&self, label: &str) -> Option<&RecordedPass> {
        self.frame_passes
            .iter()
            .find(|p| p.label.as_deref() == Some(label))
    }

    /// Labels of the recorded passes, in submission order
    pub fn pass_labels(&self) -> Vec<String> {
        self.frame_passes
            .iter()
            .map(|p| p.label.clone().unwrap_or_default())
            .collect()
    }

    /// Content digest of a texture, if anything has been written to it
    pub fn texture_digest(&self, texture: TextureHandle) -> Option<u64> {
        self.digests.get(&texture.0).copied()
    }

    /// Content digest of the texture behind a view
    pub fn view_digest(&self, view: TextureViewHandle) -> Option<u64> {
        let texture = self.texture_views.get(&view.0)?;
        self.digests.get(texture).copied()
    }

    /// Texture a view was created from
    pub fn view_texture(&self, view: TextureViewHandle) -> Option<TextureHandle> {
        self.texture_views.get(&view.0).copied().map(TextureHandle)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.as_slice())
    }

    /// The texture presented at the end of each frame
    pub fn swapchain_texture(&self) -> TextureHandle {
        self.swapchain_texture
    }

    /// Live textures, the swapchain included
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Command stream misuse collected so far
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    fn texture_of_view(&self, view: TextureViewHandle) -> Option<u64> {
        self.texture_views.get(&view.0).copied()
    }

    /// Fold the bound state of a bind group into the pass digest
    fn hash_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        let Some(entries) = self.bind_groups.get(&bind_group.0) else {
            self.violation(format!("bind group {} does not exist", bind_group.0));
            return;
        };

        let mut state = DefaultHasher::new();
        let mut sampled_outputs = Vec::new();
        index.hash(&mut state);
        for (binding, entry) in entries {
            binding.hash(&mut state);
            match entry {
                BindGroupEntry::Buffer { buffer, offset, size } => {
                    let bytes = self.buffers.get(&buffer.0).map(|b| b.as_slice()).unwrap_or(&[]);
                    let start = (*offset as usize).min(bytes.len());
                    let end = size
                        .map(|s| (start + s as usize).min(bytes.len()))
                        .unwrap_or(bytes.len());
                    bytes[start..end].hash(&mut state);
                }
                BindGroupEntry::Texture(view) => {
                    let texture = self.texture_of_view(*view);
                    if let (Some(texture), Some(open)) = (texture, self.open_pass.as_ref()) {
                        let writes_it = open.pass.color_targets.iter().any(|t| t.0 == texture)
                            || open.pass.depth_target.map(|t| t.0) == Some(texture);
                        if writes_it {
                            sampled_outputs.push(texture);
                        }
                    }
                    texture
                        .and_then(|t| self.digests.get(&t))
                        .copied()
                        .unwrap_or(0)
                        .hash(&mut state);
                }
                BindGroupEntry::Sampler(sampler) => {
                    if let Some(desc) = self.samplers.get(&sampler.0) {
                        format!("{:?}", desc).hash(&mut state);
                    }
                }
            }
        }

        for texture in sampled_outputs {
            self.violation(format!(
                "texture {} is sampled by the pass that renders to it",
                texture
            ));
        }

        let digest = state.finish();
        if let Some(open) = self.open_pass.as_mut() {
            digest.hash(&mut open.hasher);
        }
    }

    fn record(&mut self, command: RecordedCommand) -> bool {
        log::trace!("HeadlessBackend: {:?}", command);
        match self.open_pass.as_mut() {
            Some(open) => {
                open.pass.commands.push(command);
                true
            }
            None => {
                self.violation(format!("{:?} recorded outside a render pass", command));
                false
            }
        }
    }

    fn record_draw(&mut self, command: RecordedCommand) {
        let pipeline_bound = self.open_pass.as_ref().map(|o| o.pipeline_bound);
        if pipeline_bound == Some(false) {
            self.violation(format!("{:?} issued without a pipeline", command));
        }
        if let Some(open) = self.open_pass.as_mut() {
            format!("{:?}", command).hash(&mut open.hasher);
        }
        self.record(command);
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_width = width;
            self.surface_height = height;
            if let Some(desc) = self.textures.get_mut(&self.swapchain_texture.0) {
                desc.width = width;
                desc.height = height;
            }
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_width, self.surface_height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if self.in_frame {
            self.violation("begin_frame called twice without end_frame".to_string());
        }
        self.in_frame = true;
        self.frame_passes.clear();
        self.digests.remove(&self.swapchain_texture.0);
        log::trace!("HeadlessBackend: begin frame {}", self.frame_index);

        Ok(FrameContext {
            swapchain_view: self.swapchain_view,
            width: self.surface_width,
            height: self.surface_height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.open_pass.is_some() {
            self.violation("frame ended with an open render pass".to_string());
            self.end_render_pass();
        }
        if !self.in_frame {
            self.violation("end_frame called without begin_frame".to_string());
        }
        self.in_frame = false;
        self.frame_index += 1;
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!("HeadlessBackend: creating buffer {:?} (size: {})", desc.label, desc.size);
        let id = self.allocate_id();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!("HeadlessBackend: creating buffer {:?} ({} bytes)", desc.label, data.len());
        let id = self.allocate_id();
        self.buffers.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(contents) = self.buffers.get_mut(&buffer.0) else {
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            let len = contents.len();
            self.violation(format!(
                "write of {} bytes at {} overflows buffer {} ({} bytes)",
                data.len(),
                offset,
                buffer.0,
                len
            ));
            return;
        }
        contents[start..end].copy_from_slice(data);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: zero-sized texture",
                desc.label
            )));
        }
        log::trace!(
            "HeadlessBackend: creating texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let id = self.allocate_id();
        self.texture_views.insert(id, texture.0);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        let mut hasher = DefaultHasher::new();
        (width, height).hash(&mut hasher);
        data.hash(&mut hasher);
        self.digests.insert(texture.0, hasher.finish());
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let id = self.allocate_id();
        self.samplers.insert(id, desc.clone());
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.allocate_id()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        for (_, entry) in entries {
            let missing = match entry {
                BindGroupEntry::Buffer { buffer, .. } => !self.buffers.contains_key(&buffer.0),
                BindGroupEntry::Texture(view) => !self.texture_views.contains_key(&view.0),
                BindGroupEntry::Sampler(sampler) => !self.samplers.contains_key(&sampler.0),
            };
            if missing {
                return Err(BackendError::PipelineCreationFailed(format!(
                    "bind group entry {:?} refers to a missing resource",
                    entry
                )));
            }
        }
        let id = self.allocate_id();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let mut hasher = DefaultHasher::new();
        desc.shader_source.hash(&mut hasher);
        desc.vertex_entry.hash(&mut hasher);
        desc.fragment_entry.hash(&mut hasher);
        format!("{:?}", desc.color_targets).hash(&mut hasher);
        format!("{:?}", desc.depth_stencil).hash(&mut hasher);
        format!("{:?}", desc.cull_mode).hash(&mut hasher);

        let id = self.allocate_id();
        self.pipelines.insert(id, hasher.finish());
        log::trace!("HeadlessBackend: creating pipeline {:?}", desc.label);
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        if let Some(open) = &self.open_pass {
            let message = format!(
                "begin_render_pass({:?}) while {:?} is still open",
                desc.label, open.pass.label
            );
            self.violation(message);
            self.end_render_pass();
        }
        if !self.in_frame {
            self.violation(format!("render pass {:?} outside a frame", desc.label));
        }

        let mut color_targets = Vec::new();
        let mut color_loads = Vec::new();
        for attachment in &desc.color_attachments {
            match self.texture_of_view(attachment.view) {
                Some(texture) => {
                    color_targets.push(TextureHandle(texture));
                    color_loads.push(attachment.load_op);
                }
                None => self.violation(format!("unknown color view {}", attachment.view.0)),
            }
        }
        let depth_target = desc
            .depth_stencil_attachment
            .as_ref()
            .and_then(|att| self.texture_of_view(att.view))
            .map(TextureHandle);
        let depth_clear = desc.depth_stencil_attachment.as_ref().and_then(|att| {
            match att.depth_load_op {
                LoadOp::Clear(_) => Some(att.depth_clear_value),
                LoadOp::Load => None,
            }
        });

        let sizes: Vec<(u32, u32)> = color_targets
            .iter()
            .chain(depth_target.iter())
            .filter_map(|t| self.textures.get(&t.0))
            .map(|d| (d.width, d.height))
            .collect();
        if sizes.windows(2).any(|w| w[0] != w[1]) {
            self.violation(format!("attachments of {:?} differ in size: {:?}", desc.label, sizes));
        }

        log::trace!("HeadlessBackend: begin pass {:?}", desc.label);
        self.open_pass = Some(OpenPass {
            pass: RecordedPass {
                label: desc.label.clone(),
                color_targets,
                color_loads,
                depth_target,
                depth_clear,
                commands: Vec::new(),
            },
            hasher: DefaultHasher::new(),
            pipeline_bound: false,
        });
    }

    fn end_render_pass(&mut self) {
        let Some(open) = self.open_pass.take() else {
            self.violation("end_render_pass without an open pass".to_string());
            return;
        };
        let commands_digest = open.hasher.finish();
        let pass = open.pass;

        for (slot, (texture, load)) in pass.color_targets.iter().zip(&pass.color_loads).enumerate() {
            let mut hasher = DefaultHasher::new();
            match load {
                LoadOp::Clear(color) => color.map(f32::to_bits).hash(&mut hasher),
                LoadOp::Load => self.digests.get(&texture.0).copied().unwrap_or(0).hash(&mut hasher),
            }
            if pass.draw_count() > 0 {
                slot.hash(&mut hasher);
                commands_digest.hash(&mut hasher);
            }
            self.digests.insert(texture.0, hasher.finish());
        }

        if let Some(texture) = pass.depth_target {
            let mut hasher = DefaultHasher::new();
            match pass.depth_clear {
                Some(depth) => depth.to_bits().hash(&mut hasher),
                None => self.digests.get(&texture.0).copied().unwrap_or(0).hash(&mut hasher),
            }
            if pass.draw_count() > 0 {
                u32::MAX.hash(&mut hasher);
                commands_digest.hash(&mut hasher);
            }
            self.digests.insert(texture.0, hasher.finish());
        }

        log::trace!(
            "HeadlessBackend: end pass {:?} ({} draws)",
            pass.label,
            pass.draw_count()
        );
        self.frame_passes.push(pass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        let Some(&digest) = self.pipelines.get(&pipeline.0) else {
            self.violation(format!("pipeline {} does not exist", pipeline.0));
            return;
        };
        if let Some(open) = self.open_pass.as_mut() {
            open.pipeline_bound = true;
            digest.hash(&mut open.hasher);
        }
        self.record(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if self.record(RecordedCommand::SetBindGroup { index, bind_group }) {
            self.hash_bind_group(index, bind_group);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        if self.record(RecordedCommand::SetVertexBuffer { slot, buffer }) {
            let bytes = self.buffers.get(&buffer.0).map(|b| b.as_slice()).unwrap_or(&[]);
            let mut state = DefaultHasher::new();
            (slot, offset).hash(&mut state);
            bytes.hash(&mut state);
            let digest = state.finish();
            if let Some(open) = self.open_pass.as_mut() {
                digest.hash(&mut open.hasher);
            }
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        if self.record(RecordedCommand::SetIndexBuffer { buffer, format }) {
            let bytes = self.buffers.get(&buffer.0).map(|b| b.as_slice()).unwrap_or(&[]);
            let mut state = DefaultHasher::new();
            (offset, format).hash(&mut state);
            bytes.hash(&mut state);
            let digest = state.finish();
            if let Some(open) = self.open_pass.as_mut() {
                digest.hash(&mut open.hasher);
            }
        }
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        let target_size = self.open_pass.as_ref().and_then(|open| {
            open.pass
                .color_targets
                .first()
                .or(open.pass.depth_target.as_ref())
                .and_then(|t| self.textures.get(&t.0))
                .map(|d| (d.width as f32, d.height as f32))
        });
        if let Some((tw, th)) = target_size {
            if x + width > tw || y + height > th {
                self.violation(format!(
                    "viewport {}x{} at ({}, {}) exceeds target {}x{}",
                    width, height, x, y, tw, th
                ));
            }
        }
        if let Some(open) = self.open_pass.as_mut() {
            [x, y, width, height].map(f32::to_bits).hash(&mut open.hasher);
        }
        self.record(RecordedCommand::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record_draw(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, instances: Range<u32>) {
        self.record_draw(RecordedCommand::DrawIndexed { indices, instances });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.digests.remove(&texture.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(backend: &mut HeadlessBackend, w: u32, h: u32) -> (TextureHandle, TextureViewHandle) {
        let texture = backend
            .create_texture(&TextureDescriptor::render_target("target", w, h, TextureFormat::Rgba8Unorm))
            .unwrap();
        let view = backend.create_texture_view(texture).unwrap();
        (texture, view)
    }

    fn pipeline(backend: &mut HeadlessBackend) -> RenderPipelineHandle {
        backend
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("test".into()),
                shader_source: "source".into(),
                vertex_entry: "vs_main".into(),
                fragment_entry: Some("fs_main".into()),
                vertex_layouts: vec![],
                bind_group_layouts: vec![],
                primitive_topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                depth_stencil: None,
                color_targets: vec![ColorTargetState::replace(TextureFormat::Rgba8Unorm)],
            })
            .unwrap()
    }

    fn draw_pass(
        backend: &mut HeadlessBackend,
        view: TextureViewHandle,
        pipeline: RenderPipelineHandle,
        bind_group: BindGroupHandle,
    ) {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("draw".into()),
            color_attachments: vec![ColorAttachment::clear(view, [0.0; 4])],
            depth_stencil_attachment: None,
        });
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, bind_group);
        backend.draw(0..3, 0..1);
        backend.end_render_pass();
    }

    #[test]
    fn test_clear_only_digest_depends_on_color() {
        let mut backend = HeadlessBackend::new(64, 64);
        let (a, view_a) = target(&mut backend, 8, 8);
        let (b, view_b) = target(&mut backend, 8, 8);

        backend.begin_frame().unwrap();
        for (view, color) in [(view_a, [1.0, 0.0, 0.0, 1.0]), (view_b, [0.0, 1.0, 0.0, 1.0])] {
            backend.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: vec![ColorAttachment::clear(view, color)],
                depth_stencil_attachment: None,
            });
            backend.end_render_pass();
        }
        backend.end_frame().unwrap();

        assert_ne!(backend.texture_digest(a), backend.texture_digest(b));
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn test_digest_tracks_uniform_contents() {
        let mut backend = HeadlessBackend::new(64, 64);
        let (texture, view) = target(&mut backend, 8, 8);
        let pipeline = pipeline(&mut backend);
        let buffer = backend
            .create_buffer(&BufferDescriptor::uniform("params", 16))
            .unwrap();
        let layout = backend
            .create_bind_group_layout(&[BindGroupLayoutEntry::uniform(0, ShaderStageFlags::FRAGMENT)])
            .unwrap();
        let group = backend
            .create_bind_group(layout, &[(0, BindGroupEntry::buffer(buffer))])
            .unwrap();

        backend.begin_frame().unwrap();
        draw_pass(&mut backend, view, pipeline, group);
        backend.end_frame().unwrap();
        let first = backend.texture_digest(texture);

        backend.begin_frame().unwrap();
        draw_pass(&mut backend, view, pipeline, group);
        backend.end_frame().unwrap();
        assert_eq!(first, backend.texture_digest(texture));

        backend.write_buffer(buffer, 0, bytemuck::bytes_of(&[1.0f32, 0.0, 0.0, 0.0]));
        backend.begin_frame().unwrap();
        draw_pass(&mut backend, view, pipeline, group);
        backend.end_frame().unwrap();
        assert_ne!(first, backend.texture_digest(texture));
    }

    #[test]
    fn test_nested_pass_is_a_violation() {
        let mut backend = HeadlessBackend::new(64, 64);
        let (_, view) = target(&mut backend, 8, 8);

        backend.begin_frame().unwrap();
        let desc = RenderPassDescriptor {
            label: Some("outer".into()),
            color_attachments: vec![ColorAttachment::clear(view, [0.0; 4])],
            depth_stencil_attachment: None,
        };
        backend.begin_render_pass(&desc);
        backend.begin_render_pass(&desc);
        backend.end_render_pass();
        backend.end_frame().unwrap();

        assert_eq!(backend.violations().len(), 1);
        assert_eq!(backend.frame_passes().len(), 2);
    }

    #[test]
    fn test_sampling_own_target_is_a_violation() {
        let mut backend = HeadlessBackend::new(64, 64);
        let (_, view) = target(&mut backend, 8, 8);
        let pipeline = pipeline(&mut backend);
        let layout = backend
            .create_bind_group_layout(&[BindGroupLayoutEntry::texture(
                0,
                TextureSampleType::Float { filterable: true },
            )])
            .unwrap();
        let group = backend
            .create_bind_group(layout, &[(0, BindGroupEntry::Texture(view))])
            .unwrap();

        backend.begin_frame().unwrap();
        draw_pass(&mut backend, view, pipeline, group);
        backend.end_frame().unwrap();

        assert_eq!(backend.violations().len(), 1);
    }

    #[test]
    fn test_viewport_larger_than_target_is_a_violation() {
        let mut backend = HeadlessBackend::new(64, 64);
        let (_, view) = target(&mut backend, 8, 8);

        backend.begin_frame().unwrap();
        backend.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: vec![ColorAttachment::clear(view, [0.0; 4])],
            depth_stencil_attachment: None,
        });
        backend.set_viewport(0.0, 0.0, 8.0, 8.0, 0.0, 1.0);
        assert!(backend.violations().is_empty());
        backend.set_viewport(0.0, 0.0, 16.0, 8.0, 0.0, 1.0);
        backend.end_render_pass();
        backend.end_frame().unwrap();

        assert_eq!(backend.violations().len(), 1);
    }

    #[test]
    fn test_resize_updates_surface_only() {
        let mut backend = HeadlessBackend::new(1920, 1080);
        let (texture, _) = target(&mut backend, 1920, 1080);
        backend.resize(800, 600);

        assert_eq!(backend.surface_size(), (800, 600));
        let swapchain = backend.swapchain_texture();
        assert_eq!(backend.texture_descriptor(swapchain).unwrap().width, 800);
        assert_eq!(backend.texture_descriptor(texture).unwrap().width, 1920);
    }
}
