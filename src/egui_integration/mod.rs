//! egui GUI integration
//!
//! Draws the control panel on top of the presented frame through the wgpu
//! backend.

mod wgpu;

pub use self::wgpu::WgpuEguiIntegration;
