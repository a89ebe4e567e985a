//! egui control panel for the pipeline

use crate::pipeline::postprocess::bloom::{MAX_BLOOM_PASSES, MIN_BLOOM_PASSES};
use crate::pipeline::postprocess::{BloomEffect, ColorFilterEffect, FilmGrainEffect, PixelatedEffect, PostEffect};
use crate::pipeline::{DeferredPipeline, DisplayMode};
use crate::scene::Scene;
use crate::time::FrameStats;

/// Limit of each light direction component in the panel
const LIGHT_DIRECTION_RANGE: f32 = 10.0;

/// Show the pipeline window: display mode, post effect and its parameters,
/// light direction and frame rate.
pub fn pipeline_panel(ctx: &egui::Context, pipeline: &mut DeferredPipeline, scene: &mut Scene, stats: &FrameStats) {
    egui::Window::new("Deferred Pipeline")
        .default_pos([10.0, 10.0])
        .default_width(260.0)
        .resizable(true)
        .show(ctx, |ui| {
            ui.label(format!(
                "{:.0} FPS (avg {:.0}, min {:.0}, max {:.0})",
                stats.current(),
                stats.average(),
                stats.min(),
                stats.max()
            ));
            ui.separator();

            display_mode_controls(ui, pipeline);
            ui.separator();

            effect_controls(ui, pipeline);
            ui.separator();

            light_controls(ui, scene);
        });
}

fn display_mode_controls(ui: &mut egui::Ui, pipeline: &mut DeferredPipeline) {
    ui.label("Display");
    let current = pipeline.display_mode();
    ui.horizontal_wrapped(|ui| {
        for mode in DisplayMode::ALL {
            if ui.selectable_label(current == mode, mode.name()).clicked() && current != mode {
                pipeline.set_display_mode(mode);
            }
        }
    });
}

fn effect_controls(ui: &mut egui::Ui, pipeline: &mut DeferredPipeline) {
    let count = pipeline.effects().len();
    if count == 0 {
        ui.label("No post effects registered");
        return;
    }

    let mut active = pipeline.active_effect();
    let name = pipeline
        .effects()
        .get(active)
        .map(|e| e.name().to_string())
        .unwrap_or_else(|| "none".to_string());
    if ui
        .add(egui::Slider::new(&mut active, 0..=count - 1).text(format!("Effect ({})", name)))
        .changed()
    {
        pipeline.set_active_effect(active);
    }

    let index = pipeline.active_effect();
    if let Some(effect) = pipeline.effects_mut().get_index_mut(index) {
        effect_parameters(ui, effect.as_mut());
    }
}

/// Sliders for the parameters of one effect
fn effect_parameters(ui: &mut egui::Ui, effect: &mut dyn PostEffect) {
    let any = effect.as_any_mut();

    if let Some(bloom) = any.downcast_mut::<BloomEffect>() {
        let mut threshold = bloom.threshold();
        if ui
            .add(egui::Slider::new(&mut threshold, 0.01..=1.0).text("Threshold"))
            .changed()
        {
            bloom.set_threshold(threshold);
        }
        let mut passes = bloom.passes();
        if ui
            .add(egui::Slider::new(&mut passes, MIN_BLOOM_PASSES..=MAX_BLOOM_PASSES).text("Blur passes"))
            .changed()
        {
            bloom.set_passes(passes);
        }
    } else if let Some(grain) = any.downcast_mut::<FilmGrainEffect>() {
        let mut strength = grain.strength();
        if ui
            .add(egui::Slider::new(&mut strength, 0.0..=20.0).text("Strength"))
            .changed()
        {
            grain.set_strength(strength);
        }
    } else if let Some(pixelated) = any.downcast_mut::<PixelatedEffect>() {
        let mut pixels = pixelated.pixels();
        if ui
            .add(egui::Slider::new(&mut pixels, 256.0..=1024.0).text("Pixels"))
            .changed()
        {
            pixelated.set_pixels(pixels);
        }
    } else if let Some(filter) = any.downcast_mut::<ColorFilterEffect>() {
        let mut intensity = filter.intensity();
        if ui
            .add(egui::Slider::new(&mut intensity, 0.0..=1.0).text("Intensity"))
            .changed()
        {
            filter.set_intensity(intensity);
        }
    }
}

fn light_controls(ui: &mut egui::Ui, scene: &mut Scene) {
    let Some(mut light) = scene.light_mut() else {
        ui.label("No light in scene");
        return;
    };

    let mut direction = light.direction;
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label("Light direction");
        changed |= ui.add(egui::DragValue::new(&mut direction.x).speed(0.05).prefix("x: ")).changed();
        changed |= ui.add(egui::DragValue::new(&mut direction.y).speed(0.05).prefix("y: ")).changed();
        changed |= ui.add(egui::DragValue::new(&mut direction.z).speed(0.05).prefix("z: ")).changed();
    });

    if changed {
        light.direction = direction.clamp(
            glam::Vec3::splat(-LIGHT_DIRECTION_RANGE),
            glam::Vec3::splat(LIGHT_DIRECTION_RANGE),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::resources::Assets;
    use crate::scene::DirectionalLight;
    use crate::PipelineConfig;

    #[test]
    fn test_panel_without_input_changes_nothing() {
        let mut backend = HeadlessBackend::new(32, 32);
        let config = PipelineConfig {
            width: 32,
            height: 32,
            ..Default::default()
        };
        let mut pipeline = DeferredPipeline::new(&mut backend, &config, &Assets::new()).unwrap();
        let mut scene = Scene::new();
        scene.spawn_light(DirectionalLight::default());
        let light = scene.light().unwrap();
        let stats = FrameStats::new();

        let ctx = egui::Context::default();
        for _ in 0..2 {
            let _ = ctx.run(egui::RawInput::default(), |ctx| {
                pipeline_panel(ctx, &mut pipeline, &mut scene, &stats);
            });
        }

        assert_eq!(pipeline.display_mode(), DisplayMode::Normal);
        assert_eq!(pipeline.active_effect(), 0);
        assert_eq!(scene.light().unwrap(), light);
    }

    #[test]
    fn test_panel_handles_empty_registry_and_no_light() {
        let mut backend = HeadlessBackend::new(32, 32);
        let config = PipelineConfig {
            width: 32,
            height: 32,
            effects: Vec::new(),
            ..Default::default()
        };
        let mut pipeline = DeferredPipeline::new(&mut backend, &config, &Assets::new()).unwrap();
        let mut scene = Scene::new();

        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            pipeline_panel(ctx, &mut pipeline, &mut scene, &FrameStats::new());
        });
        assert!(pipeline.effects().is_empty());
    }
}
