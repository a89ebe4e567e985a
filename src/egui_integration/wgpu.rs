//! egui overlay rendered through the wgpu backend

use egui::ViewportId;
use egui_wgpu::ScreenDescriptor;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::backend::wgpu_backend::WgpuBackend;
use crate::backend::GraphicsBackend;

/// egui context, input state and renderer for one window
pub struct WgpuEguiIntegration {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    /// Surface size over window size, below 1.0 when the surface is clamped
    input_scale: f32,
}

impl WgpuEguiIntegration {
    pub fn new(backend: &WgpuBackend, window: &Window) -> Self {
        let ctx = egui::Context::default();
        let winit_state = egui_winit::State::new(
            ctx.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );
        let renderer = egui_wgpu::Renderer::new(backend.device(), backend.wgpu_surface_format(), None, 1);

        Self {
            ctx,
            winit_state,
            renderer,
            paint_jobs: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
            input_scale: 1.0,
        }
    }

    /// Recompute the pointer scale after the window or surface changed size
    pub fn update_surface_scale(&mut self, window_size: (u32, u32), surface_size: (u32, u32)) {
        let scale_x = surface_size.0 as f32 / window_size.0.max(1) as f32;
        let scale_y = surface_size.1 as f32 / window_size.1.max(1) as f32;
        self.input_scale = scale_x.min(scale_y);
    }

    /// Feed a window event; returns true when egui consumed it
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let scaled = match event {
            WindowEvent::CursorMoved { device_id, position } if self.input_scale != 1.0 => {
                Some(WindowEvent::CursorMoved {
                    device_id: *device_id,
                    position: winit::dpi::PhysicalPosition::new(
                        position.x * self.input_scale as f64,
                        position.y * self.input_scale as f64,
                    ),
                })
            }
            _ => None,
        };
        self.winit_state
            .on_window_event(window, scaled.as_ref().unwrap_or(event))
            .consumed
    }

    /// Build this frame's UI with `build`
    pub fn run(&mut self, window: &Window, build: impl FnOnce(&egui::Context)) {
        let mut raw_input = self.winit_state.take_egui_input(window);
        if self.input_scale != 1.0 {
            if let Some(rect) = &mut raw_input.screen_rect {
                rect.max.x *= self.input_scale;
                rect.max.y *= self.input_scale;
            }
        }

        self.ctx.begin_frame(raw_input);
        build(&self.ctx);
        let output = self.ctx.end_frame();

        self.winit_state
            .handle_platform_output(window, output.platform_output);
        self.paint_jobs = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        self.textures_delta = output.textures_delta;
    }

    /// Draw the last built UI over the current swapchain image
    pub fn render(&mut self, backend: &mut WgpuBackend) {
        let (width, height) = backend.surface_size();
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.ctx.pixels_per_point(),
        };

        let (device, queue, encoder) = backend.device_queue_encoder();
        for (id, image_delta) in &self.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
        let Some(encoder) = encoder else {
            log::warn!("egui render called outside a frame");
            return;
        };
        self.renderer
            .update_buffers(device, queue, encoder, &self.paint_jobs, &screen_descriptor);

        backend.render_egui(&self.renderer, &self.paint_jobs, &screen_descriptor);

        for id in &self.textures_delta.free {
            self.renderer.free_texture(id);
        }
        self.textures_delta = egui::TexturesDelta::default();
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn wants_keyboard_input(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }
}
