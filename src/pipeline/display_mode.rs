//! Selection of what reaches the screen each frame

use crate::pipeline::gbuffer_pass::{GBUFFER_ALBEDO, GBUFFER_NORMAL, GBUFFER_POSITION};

/// The six presentation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    /// Lit image through the active post effect
    #[default]
    Normal,
    /// Lit image from the single directional light only
    SingleLightOnly,
    PositionBuffer,
    NormalBuffer,
    ColorBuffer,
    LightAccumulation,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 6] = [
        DisplayMode::Normal,
        DisplayMode::SingleLightOnly,
        DisplayMode::PositionBuffer,
        DisplayMode::NormalBuffer,
        DisplayMode::ColorBuffer,
        DisplayMode::LightAccumulation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DisplayMode::Normal => "Normal",
            DisplayMode::SingleLightOnly => "Single Light Only",
            DisplayMode::PositionBuffer => "Position Buffer",
            DisplayMode::NormalBuffer => "Normal Buffer",
            DisplayMode::ColorBuffer => "Color Buffer",
            DisplayMode::LightAccumulation => "Light Accumulation",
        }
    }

    /// Where the presented image comes from
    pub fn source(&self) -> DisplaySource {
        match self {
            DisplayMode::Normal | DisplayMode::SingleLightOnly => DisplaySource::ActiveEffect,
            DisplayMode::PositionBuffer => DisplaySource::GBuffer(GBUFFER_POSITION),
            DisplayMode::NormalBuffer => DisplaySource::GBuffer(GBUFFER_NORMAL),
            DisplayMode::ColorBuffer => DisplaySource::GBuffer(GBUFFER_ALBEDO),
            DisplayMode::LightAccumulation => DisplaySource::Illumination,
        }
    }
}

/// Buffer presented for a display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySource {
    /// Illumination buffer through the active post effect
    ActiveEffect,
    /// One G-buffer target, by index
    GBuffer(usize),
    /// Illumination buffer, unprocessed
    Illumination,
}

/// Holds the current display mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayModeSelector {
    mode: DisplayMode,
}

impl DisplayModeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> DisplayMode {
        self.mode
    }

    pub fn set(&mut self, mode: DisplayMode) {
        if mode != self.mode {
            log::info!("Display mode: {} -> {}", self.mode.name(), mode.name());
            self.mode = mode;
        }
    }

    /// Switch to `mode`, or back to [`DisplayMode::Normal`] if already there
    pub fn toggle(&mut self, mode: DisplayMode) {
        if self.mode == mode {
            self.set(DisplayMode::Normal);
        } else {
            self.set(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_returns_to_normal() {
        let mut selector = DisplayModeSelector::new();
        selector.toggle(DisplayMode::ColorBuffer);
        assert_eq!(selector.get(), DisplayMode::ColorBuffer);
        selector.toggle(DisplayMode::LightAccumulation);
        assert_eq!(selector.get(), DisplayMode::LightAccumulation);
        selector.toggle(DisplayMode::LightAccumulation);
        assert_eq!(selector.get(), DisplayMode::Normal);
    }

    #[test]
    fn test_sources() {
        assert_eq!(DisplayMode::Normal.source(), DisplaySource::ActiveEffect);
        assert_eq!(DisplayMode::SingleLightOnly.source(), DisplaySource::ActiveEffect);
        assert_eq!(DisplayMode::PositionBuffer.source(), DisplaySource::GBuffer(3));
        assert_eq!(DisplayMode::NormalBuffer.source(), DisplaySource::GBuffer(1));
        assert_eq!(DisplayMode::ColorBuffer.source(), DisplaySource::GBuffer(0));
        assert_eq!(DisplayMode::LightAccumulation.source(), DisplaySource::Illumination);
    }
}
