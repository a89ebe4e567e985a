//! Keyboard toggles
//!
//! Maps winit key events to pipeline actions. A toggle fires once per press:
//! holding a key or OS key repeat does not fire it again.

use crate::pipeline::{DeferredPipeline, DisplayMode};
use crate::scene::Camera;
use std::collections::HashSet;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Something a key press asks the pipeline to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Switch the camera between perspective and orthographic
    ToggleProjection,
    /// Show the colour G-buffer, or go back to normal
    ToggleColorBuffer,
    /// Show the illumination buffer, or go back to normal
    ToggleLightAccumulation,
}

impl InputAction {
    /// Action bound to a physical key, if any
    pub fn for_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyT => Some(InputAction::ToggleProjection),
            KeyCode::KeyO => Some(InputAction::ToggleColorBuffer),
            KeyCode::KeyP => Some(InputAction::ToggleLightAccumulation),
            _ => None,
        }
    }

    /// Carry out the action
    pub fn apply(&self, pipeline: &mut DeferredPipeline, camera: &mut Camera) {
        match self {
            InputAction::ToggleProjection => camera.toggle_ortho(),
            InputAction::ToggleColorBuffer => pipeline.toggle_display_mode(DisplayMode::ColorBuffer),
            InputAction::ToggleLightAccumulation => {
                pipeline.toggle_display_mode(DisplayMode::LightAccumulation)
            }
        }
    }
}

/// Edge-triggered key watcher, polled once per frame
#[derive(Debug, Default)]
pub struct InputWatcher {
    held: HashSet<KeyCode>,
    pending: Vec<InputAction>,
}

impl InputWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a window event; non-keyboard events are ignored
    pub fn handle_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if let PhysicalKey::Code(key) = event.physical_key {
                self.handle_key(key, event.state == ElementState::Pressed);
            }
        }
    }

    /// Record a key going down or up
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if !pressed {
            self.held.remove(&key);
            return;
        }
        // insert() is false while the key is already held
        if self.held.insert(key) {
            if let Some(action) = InputAction::for_key(key) {
                log::debug!("Key {:?} -> {:?}", key, action);
                self.pending.push(action);
            }
        }
    }

    /// Actions triggered since the last poll, in press order
    ///
    /// While the UI has keyboard focus the presses are dropped.
    pub fn poll(&mut self, ui_wants_keyboard: bool) -> Vec<InputAction> {
        let actions = std::mem::take(&mut self.pending);
        if ui_wants_keyboard {
            return Vec::new();
        }
        actions
    }

    /// Forget held keys, e.g. when the window loses focus
    pub fn reset(&mut self) {
        self.held.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_fires_once_until_released() {
        let mut input = InputWatcher::new();
        input.handle_key(KeyCode::KeyO, true);
        input.handle_key(KeyCode::KeyO, true);
        assert_eq!(input.poll(false), vec![InputAction::ToggleColorBuffer]);
        assert!(input.poll(false).is_empty());

        input.handle_key(KeyCode::KeyO, false);
        input.handle_key(KeyCode::KeyO, true);
        assert_eq!(input.poll(false), vec![InputAction::ToggleColorBuffer]);
    }

    #[test]
    fn test_unbound_keys_ignored() {
        let mut input = InputWatcher::new();
        input.handle_key(KeyCode::KeyW, true);
        input.handle_key(KeyCode::KeyT, true);
        input.handle_key(KeyCode::KeyP, true);
        assert_eq!(
            input.poll(false),
            vec![InputAction::ToggleProjection, InputAction::ToggleLightAccumulation]
        );
    }

    #[test]
    fn test_ui_focus_drops_presses() {
        let mut input = InputWatcher::new();
        input.handle_key(KeyCode::KeyT, true);
        assert!(input.poll(true).is_empty());
        assert!(input.poll(false).is_empty());
    }

    #[test]
    fn test_actions_apply_to_pipeline_and_camera() {
        use crate::backend::HeadlessBackend;
        use crate::resources::Assets;
        use crate::PipelineConfig;

        let mut backend = HeadlessBackend::new(32, 32);
        let config = PipelineConfig {
            width: 32,
            height: 32,
            ..Default::default()
        };
        let mut pipeline = DeferredPipeline::new(&mut backend, &config, &Assets::new()).unwrap();
        let mut camera = Camera::default();

        InputAction::ToggleProjection.apply(&mut pipeline, &mut camera);
        assert!(camera.is_orthographic());

        InputAction::ToggleColorBuffer.apply(&mut pipeline, &mut camera);
        assert_eq!(pipeline.display_mode(), DisplayMode::ColorBuffer);
        InputAction::ToggleLightAccumulation.apply(&mut pipeline, &mut camera);
        assert_eq!(pipeline.display_mode(), DisplayMode::LightAccumulation);
        InputAction::ToggleLightAccumulation.apply(&mut pipeline, &mut camera);
        assert_eq!(pipeline.display_mode(), DisplayMode::Normal);
    }
}
