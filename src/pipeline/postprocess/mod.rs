//! Post-processing effects
//!
//! Effects read the illumination buffer and write their own targets. The
//! registry keeps them in catalog order; exactly one is active per frame and
//! only that one applies and presents, while every effect clears its targets.

pub mod bloom;
pub mod color_filter;
pub mod film_grain;
pub mod pixelated;

pub use bloom::BloomEffect;
pub use color_filter::{ColorFilter, ColorFilterEffect};
pub use film_grain::FilmGrainEffect;
pub use pixelated::PixelatedEffect;

use crate::backend::traits::*;
use crate::error::PipelineResult;
use crate::pipeline::fullscreen::{Fullscreen, ScreenBlit};
use crate::time::FrameTime;
use std::any::Any;

/// Stable identity of an effect in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKey {
    Bloom,
    FilmGrain,
    Pixelated,
    Greyscale,
    Sepia,
}

impl EffectKey {
    /// Catalog used when none is configured
    pub const DEFAULT_CATALOG: [EffectKey; 3] = [EffectKey::Bloom, EffectKey::FilmGrain, EffectKey::Pixelated];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKey::Bloom => "Bloom",
            EffectKey::FilmGrain => "Film Grain",
            EffectKey::Pixelated => "Pixelated",
            EffectKey::Greyscale => "Greyscale",
            EffectKey::Sepia => "Sepia",
        }
    }

    /// Construct the effect with default parameters
    pub fn create(&self) -> Box<dyn PostEffect> {
        match self {
            EffectKey::Bloom => Box::new(BloomEffect::new()),
            EffectKey::FilmGrain => Box::new(FilmGrainEffect::new()),
            EffectKey::Pixelated => Box::new(PixelatedEffect::new()),
            EffectKey::Greyscale => Box::new(ColorFilterEffect::new(ColorFilter::Greyscale)),
            EffectKey::Sepia => Box::new(ColorFilterEffect::new(ColorFilter::Sepia)),
        }
    }
}

/// A full-screen effect over the illumination buffer
pub trait PostEffect {
    fn key(&self) -> EffectKey;

    fn name(&self) -> &str {
        self.key().name()
    }

    /// Allocate targets and pipelines; called once with the target size
    fn init(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        width: u32,
        height: u32,
    ) -> PipelineResult<()>;

    /// Clear every target the effect owns
    fn clear(&mut self, backend: &mut dyn GraphicsBackend);

    /// Process `input` into the effect's output target
    fn apply(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        input: TextureViewHandle,
        time: &FrameTime,
    ) -> PipelineResult<()>;

    /// Target holding the last applied result
    fn output(&self) -> Option<TextureViewHandle>;

    /// Present the output on the screen
    fn draw_to_screen(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        blit: &mut ScreenBlit,
        screen: TextureViewHandle,
    ) -> PipelineResult<()> {
        match self.output() {
            Some(output) => blit.blit(backend, fullscreen, "Present", output, screen),
            None => {
                log::warn!("{} has no output to present", self.name());
                Ok(())
            }
        }
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Effects in catalog order
#[derive(Default)]
pub struct EffectRegistry {
    effects: Vec<Box<dyn PostEffect>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and initialize every effect of the catalog
    pub fn from_catalog(
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        catalog: &[EffectKey],
        width: u32,
        height: u32,
    ) -> PipelineResult<Self> {
        let mut registry = Self::new();
        for key in catalog {
            registry.register(backend, fullscreen, key.create(), width, height)?;
        }
        Ok(registry)
    }

    /// Initialize and append an effect; a key already present is replaced in place
    pub fn register(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        fullscreen: &Fullscreen,
        mut effect: Box<dyn PostEffect>,
        width: u32,
        height: u32,
    ) -> PipelineResult<usize> {
        effect.init(backend, fullscreen, width, height)?;
        log::info!("Registered post effect '{}'", effect.name());

        let key = effect.key();
        match self.index_of(key) {
            Some(index) => {
                self.effects[index] = effect;
                Ok(index)
            }
            None => {
                self.effects.push(effect);
                Ok(self.effects.len() - 1)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn index_of(&self, key: EffectKey) -> Option<usize> {
        self.effects.iter().position(|e| e.key() == key)
    }

    pub fn keys(&self) -> Vec<EffectKey> {
        self.effects.iter().map(|e| e.key()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&dyn PostEffect> {
        self.effects.get(index).map(|e| e.as_ref())
    }

    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Box<dyn PostEffect>> {
        self.effects.get_mut(index)
    }

    /// Typed access to the first effect of type `T`
    pub fn get_mut<T: PostEffect + 'static>(&mut self) -> Option<&mut T> {
        self.effects
            .iter_mut()
            .find_map(|e| e.as_any_mut().downcast_mut::<T>())
    }

    pub fn find<T: PostEffect + 'static>(&self) -> Option<&T> {
        self.effects.iter().find_map(|e| e.as_any().downcast_ref::<T>())
    }

    /// Clear every effect's targets
    pub fn clear_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for effect in &mut self.effects {
            effect.clear(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    fn registry(catalog: &[EffectKey]) -> (HeadlessBackend, Fullscreen, EffectRegistry) {
        let mut backend = HeadlessBackend::new(64, 64);
        let fullscreen = Fullscreen::new(&mut backend).unwrap();
        let registry = EffectRegistry::from_catalog(&mut backend, &fullscreen, catalog, 64, 64).unwrap();
        (backend, fullscreen, registry)
    }

    #[test]
    fn test_default_catalog_order() {
        let (_, _, registry) = registry(&EffectKey::DEFAULT_CATALOG);
        assert_eq!(registry.keys(), EffectKey::DEFAULT_CATALOG.to_vec());
        assert_eq!(registry.index_of(EffectKey::Pixelated), Some(2));
        assert_eq!(registry.index_of(EffectKey::Sepia), None);
    }

    #[test]
    fn test_typed_access() {
        let (_, _, mut registry) = registry(&[EffectKey::Bloom, EffectKey::Sepia]);
        registry.get_mut::<BloomEffect>().unwrap().set_threshold(0.8);
        assert_eq!(registry.find::<BloomEffect>().unwrap().threshold(), 0.8);
        assert!(registry.get_mut::<PixelatedEffect>().is_none());
        assert_eq!(
            registry.find::<ColorFilterEffect>().unwrap().filter(),
            ColorFilter::Sepia
        );
    }

    #[test]
    fn test_register_replaces_same_key() {
        let (mut backend, fullscreen, mut registry) = registry(&EffectKey::DEFAULT_CATALOG);
        let index = registry
            .register(&mut backend, &fullscreen, EffectKey::FilmGrain.create(), 64, 64)
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_clear_all_touches_every_effect() {
        let (mut backend, _, mut registry) = registry(&EffectKey::DEFAULT_CATALOG);
        backend.begin_frame().unwrap();
        registry.clear_all(&mut backend);
        backend.end_frame().unwrap();

        let labels = backend.pass_labels();
        assert!(labels.iter().any(|l| l.starts_with("Bloom")));
        assert!(labels.iter().any(|l| l.starts_with("Film Grain")));
        assert!(labels.iter().any(|l| l.starts_with("Pixelated")));
        assert!(backend.frame_passes().iter().all(|p| p.draw_count() == 0));
    }
}
