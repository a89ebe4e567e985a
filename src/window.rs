//! Window management using winit

use crate::error::{PipelineError, PipelineResult};
use crate::PipelineConfig;
use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::EventLoop,
    window::{Window as WinitWindow, WindowBuilder},
};

/// Wrapper around winit window with additional state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    focused: bool,
    close_requested: bool,
}

impl Window {
    /// Create a window with the configured title and initial size
    pub fn new(event_loop: &EventLoop<()>, config: &PipelineConfig) -> PipelineResult<Self> {
        let window = WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(event_loop)
            .map_err(|e| PipelineError::Window(e.to_string()))?;

        let size = window.inner_size();
        log::info!("Created window '{}' ({}x{})", config.title, size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            resized: false,
            focused: true,
            close_requested: false,
        })
    }

    /// Get the raw window for backend initialization
    pub fn window(&self) -> &WinitWindow {
        &self.window
    }

    /// Get arc reference to window
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Current size, read once per frame for viewport sizing
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns whether the window was resized since the last call
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Track size, focus and close requests
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                if size.width != self.width || size.height != self.height {
                    self.width = size.width;
                    self.height = size.height;
                    self.resized = true;
                }
            }
            WindowEvent::Focused(focused) => {
                self.focused = *focused;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}
