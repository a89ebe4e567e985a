//! Whole-pipeline tests on the headless backend.
//!
//! The headless backend digests what every pass would have drawn, so these
//! tests compare buffer contents by digest instead of by pixels.

mod common;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use common::{engine, SceneOptions};
use deferred_pipeline::pipeline::postprocess::{BloomEffect, PostEffect};
use deferred_pipeline::pipeline::{builtin_shaders, DisplayMode, DisplayModeSelector, Presented};
use deferred_pipeline::render_queue::{build_render_queue, RenderableItem};
use deferred_pipeline::resources::{validate_wgsl, MaterialId, MeshId, ShaderId, LAYER_OPAQUE, LAYER_SKYBOX};
use deferred_pipeline::scene::{light_direction_from_matrix, light_space_matrix};
use deferred_pipeline::{EffectKey, Engine, Entity, HeadlessBackend, ShadowConfig};
use glam::{Mat4, Vec3};
use rstest::rstest;

/// Digests of the four G-buffer targets and the illumination buffer
fn buffer_digests(engine: &Engine<HeadlessBackend>) -> Vec<Option<u64>> {
    let backend = engine.backend();
    let pipeline = engine.pipeline();
    let mut digests: Vec<Option<u64>> = pipeline
        .gbuffer()
        .targets()
        .iter()
        .map(|t| backend.texture_digest(t.texture))
        .collect();
    digests.push(backend.texture_digest(pipeline.lighting().target().texture));
    digests
}

fn bloom_output_digest(engine: &Engine<HeadlessBackend>) -> Option<u64> {
    let output = engine
        .pipeline()
        .effects()
        .find::<BloomEffect>()
        .and_then(|b| b.output())?;
    engine.backend().view_digest(output)
}

// ============================================================================
// Frame sequence
// ============================================================================

#[test]
fn test_passes_run_in_order() {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.render().unwrap();

    let labels = engine.backend().pass_labels();
    let position = |label: &str| labels.iter().position(|l| l == label).unwrap();
    assert!(position("Shadow Pass") < position("GBuffer Pass"));
    assert!(position("GBuffer Pass") < position("Lighting Pass"));
    assert!(position("Lighting Pass") < position("Bloom Composite"));
    assert_eq!(labels.last().map(String::as_str), Some("Present"));
    assert!(engine.backend().violations().is_empty());
}

#[test]
fn test_static_scene_is_deterministic() {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.render().unwrap();
    let first = buffer_digests(&engine);
    let first_screen = engine.backend().texture_digest(engine.backend().swapchain_texture());

    engine.render().unwrap();
    let second = buffer_digests(&engine);
    let second_screen = engine.backend().texture_digest(engine.backend().swapchain_texture());

    assert!(first.iter().all(Option::is_some));
    assert_eq!(first, second);
    assert_eq!(first_screen, second_screen);
}

#[test]
fn test_moving_light_changes_illumination() {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.render().unwrap();
    let before = buffer_digests(&engine);

    engine.scene_mut().light_mut().unwrap().direction = Vec3::new(1.0, 0.0, -1.0);
    engine.render().unwrap();
    let after = buffer_digests(&engine);

    assert_ne!(before[4], after[4]);
}

// ============================================================================
// Post effects
// ============================================================================

#[rstest]
#[case::threshold(Some(0.8), None)]
#[case::passes(None, Some(9))]
#[case::both(Some(0.2), Some(2))]
fn test_bloom_parameters_only_change_bloom(#[case] threshold: Option<f32>, #[case] passes: Option<u32>) {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.render().unwrap();
    let buffers_before = buffer_digests(&engine);
    let bloom_before = bloom_output_digest(&engine);
    let grain_output = engine.pipeline().effects().get(1).and_then(|e| e.output()).unwrap();
    let grain_before = engine.backend().view_digest(grain_output);

    {
        let bloom = engine.pipeline_mut().effects_mut().get_mut::<BloomEffect>().unwrap();
        if let Some(threshold) = threshold {
            bloom.set_threshold(threshold);
        }
        if let Some(passes) = passes {
            bloom.set_passes(passes);
        }
    }
    engine.render().unwrap();

    assert_eq!(buffers_before, buffer_digests(&engine));
    assert_eq!(grain_before, engine.backend().view_digest(grain_output));
    assert_ne!(bloom_before, bloom_output_digest(&engine));
}

#[test]
fn test_bloom_runs_requested_blur_passes() {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine
        .pipeline_mut()
        .effects_mut()
        .get_mut::<BloomEffect>()
        .unwrap()
        .set_passes(3);
    engine.render().unwrap();

    let labels = engine.backend().pass_labels();
    let horizontal = labels.iter().filter(|l| *l == "Bloom Blur Horizontal").count();
    let vertical = labels.iter().filter(|l| *l == "Bloom Blur Vertical").count();
    assert_eq!((horizontal, vertical), (3, 3));
}

#[rstest]
#[case::bloom(0, Presented::Effect(EffectKey::Bloom))]
#[case::film_grain(1, Presented::Effect(EffectKey::FilmGrain))]
#[case::pixelated(2, Presented::Effect(EffectKey::Pixelated))]
#[case::out_of_range(3, Presented::Illumination)]
#[case::far_out_of_range(99, Presented::Illumination)]
fn test_active_effect_selection(#[case] index: usize, #[case] expected: Presented) {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.pipeline_mut().set_active_effect(index);

    let report = engine.render().unwrap();
    assert_eq!(report.presented, expected);

    // Every effect clears its targets whether or not it is active
    let labels = engine.backend().pass_labels();
    for clear in ["Bloom Clear Output", "Film Grain Clear", "Pixelated Clear"] {
        assert!(labels.iter().any(|l| l == clear), "missing {}", clear);
    }
    assert!(engine.backend().violations().is_empty());
}

#[test]
fn test_out_of_range_effect_presents_illumination_buffer() {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.pipeline_mut().set_display_mode(DisplayMode::LightAccumulation);
    engine.render().unwrap();
    let direct = engine.backend().texture_digest(engine.backend().swapchain_texture());

    engine.pipeline_mut().set_display_mode(DisplayMode::Normal);
    engine.pipeline_mut().set_active_effect(5);
    engine.render().unwrap();
    let fallback = engine.backend().texture_digest(engine.backend().swapchain_texture());

    assert!(direct.is_some());
    assert_eq!(direct, fallback);
}

// ============================================================================
// Display modes
// ============================================================================

#[rstest]
#[case::normal(DisplayMode::Normal, Presented::Effect(EffectKey::Bloom))]
#[case::single_light(DisplayMode::SingleLightOnly, Presented::Effect(EffectKey::Bloom))]
#[case::position(DisplayMode::PositionBuffer, Presented::GBuffer(3))]
#[case::normal_buffer(DisplayMode::NormalBuffer, Presented::GBuffer(1))]
#[case::color(DisplayMode::ColorBuffer, Presented::GBuffer(0))]
#[case::light_accumulation(DisplayMode::LightAccumulation, Presented::Illumination)]
fn test_display_mode_source(#[case] mode: DisplayMode, #[case] expected: Presented) {
    let mut engine = engine(320, 240, SceneOptions::default());
    engine.pipeline_mut().set_display_mode(mode);
    let report = engine.render().unwrap();
    assert_eq!(report.presented, expected);
}

#[rstest]
#[case::single(&[DisplayMode::ColorBuffer], DisplayMode::ColorBuffer)]
#[case::twice(&[DisplayMode::ColorBuffer, DisplayMode::ColorBuffer], DisplayMode::Normal)]
#[case::switch(&[DisplayMode::ColorBuffer, DisplayMode::LightAccumulation], DisplayMode::LightAccumulation)]
#[case::normal_stays(&[DisplayMode::Normal, DisplayMode::Normal], DisplayMode::Normal)]
#[case::long(
    &[
        DisplayMode::PositionBuffer,
        DisplayMode::NormalBuffer,
        DisplayMode::NormalBuffer,
        DisplayMode::SingleLightOnly,
        DisplayMode::LightAccumulation,
    ],
    DisplayMode::LightAccumulation
)]
fn test_display_mode_toggles(#[case] toggles: &[DisplayMode], #[case] expected: DisplayMode) {
    let mut selector = DisplayModeSelector::new();
    for &mode in toggles {
        selector.toggle(mode);
        assert!(DisplayMode::ALL.contains(&selector.get()));
    }
    assert_eq!(selector.get(), expected);
}

// ============================================================================
// Shadows and lighting
// ============================================================================

#[test]
fn test_no_casters_leaves_far_plane_clear() {
    let mut engine = engine(
        320,
        240,
        SceneOptions {
            cast_shadows: false,
            ..Default::default()
        },
    );
    let report = engine.render().unwrap();

    let mut hasher = DefaultHasher::new();
    1.0f32.to_bits().hash(&mut hasher);
    let far_plane = hasher.finish();

    let backend = engine.backend();
    assert_eq!(report.shadow_draws, 0);
    assert_eq!(backend.pass("Shadow Pass").unwrap().draw_count(), 0);
    assert_eq!(backend.texture_digest(engine.pipeline().shadow().texture()), Some(far_plane));

    assert!(report.geometry.draws > 0);
    assert!(report.lit);
    assert_eq!(backend.pass("Lighting Pass").unwrap().draw_count(), 1);
}

#[test]
fn test_missing_light_clears_illumination() {
    let mut engine = engine(
        320,
        240,
        SceneOptions {
            light: false,
            ..Default::default()
        },
    );
    let report = engine.render().unwrap();

    assert!(!report.lit);
    assert_eq!(engine.backend().pass("Lighting Pass").unwrap().draw_count(), 0);
    assert!(report.geometry.draws > 0);
    assert!(engine.backend().violations().is_empty());
}

#[rstest]
#[case::diagonal(Vec3::new(-1.0, 0.5, -2.0))]
#[case::straight_down(Vec3::new(0.0, 0.0, -1.0))]
#[case::straight_up(Vec3::new(0.0, 0.0, 3.0))]
#[case::grazing(Vec3::new(10.0, -10.0, -0.1))]
fn test_light_direction_round_trip(#[case] direction: Vec3) {
    let config = ShadowConfig::default();
    let recovered = light_direction_from_matrix(light_space_matrix(direction, &config));
    assert!(
        (recovered - direction.normalize()).length() < 1e-4,
        "{:?} came back as {:?}",
        direction,
        recovered
    );
}

// ============================================================================
// Queue and geometry
// ============================================================================

fn item(index: u32, layer: i32, shader: u32, material: u32) -> RenderableItem {
    RenderableItem {
        entity: Entity::from_raw(index),
        mesh: MeshId(0),
        material: MaterialId(material),
        shader: ShaderId(shader),
        render_layer: layer,
        world: Mat4::IDENTITY,
        cast_shadows: true,
    }
}

#[rstest]
#[case::lower_ids_on_sky(0, 0, 5, 9)]
#[case::equal_ids(3, 3, 3, 3)]
#[case::higher_ids_on_sky(9, 9, 0, 0)]
fn test_opaque_layer_before_skybox(
    #[case] sky_shader: u32,
    #[case] sky_material: u32,
    #[case] opaque_shader: u32,
    #[case] opaque_material: u32,
) {
    let items = vec![
        item(0, LAYER_SKYBOX, sky_shader, sky_material),
        item(1, LAYER_OPAQUE, opaque_shader, opaque_material),
        item(2, LAYER_OPAQUE, opaque_shader + 1, opaque_material),
    ];
    let queue = build_render_queue(&items);
    let layers: Vec<i32> = queue.iter().map(|i| i.render_layer).collect();
    assert_eq!(layers, vec![LAYER_OPAQUE, LAYER_OPAQUE, LAYER_SKYBOX]);
}

#[test]
fn test_geometry_binds_are_minimal() {
    let mut engine = engine(
        320,
        240,
        SceneOptions {
            boxes: 3,
            ..Default::default()
        },
    );
    let report = engine.render().unwrap();

    // floor, 3 red, 3 blue, skybox
    assert_eq!(report.items, 8);
    assert_eq!(report.geometry.draws, 8);
    // standard and skybox shaders
    assert_eq!(report.geometry.pipeline_binds, 2);
    // red, blue, sky
    assert_eq!(report.geometry.material_binds, 3);

    let pass = engine.backend().pass("GBuffer Pass").unwrap();
    assert_eq!(pass.pipeline_switches(), 2);
    assert_eq!(pass.bind_group_switches(2), 3);
    assert_eq!(pass.bind_group_switches(0), 1);
    assert_eq!(pass.bind_group_switches(3), 1);
}

// ============================================================================
// Window size
// ============================================================================

#[test]
fn test_targets_keep_initial_size_after_resize() {
    let mut engine = engine(1920, 1080, SceneOptions::default());
    engine.resize(800, 600);
    let report = engine.render().unwrap();

    assert_eq!(report.viewport, (800, 600));
    assert_eq!(engine.pipeline().target_size(), (1920, 1080));
    let backend = engine.backend();
    for target in engine.pipeline().gbuffer().targets() {
        let desc = backend.texture_descriptor(target.texture).unwrap();
        assert_eq!((desc.width, desc.height), (1920, 1080));
    }
    let illumination = backend
        .texture_descriptor(engine.pipeline().lighting().target().texture)
        .unwrap();
    assert_eq!((illumination.width, illumination.height), (1920, 1080));
    assert!(backend.violations().is_empty());
}

#[test]
fn test_larger_window_clamps_viewport() {
    let mut engine = engine(640, 480, SceneOptions::default());
    engine.resize(1280, 960);
    let report = engine.render().unwrap();
    assert_eq!(report.viewport, (640, 480));
}

// ============================================================================
// Shaders
// ============================================================================

#[test]
fn test_all_builtin_shaders_validate() {
    let shaders = builtin_shaders();
    assert!(shaders.len() >= 9);
    for (name, source, entries) in shaders {
        if let Err(e) = validate_wgsl(name, &source, entries) {
            panic!("{}", e);
        }
    }
}

#[test]
fn test_many_frames_without_violations() {
    let mut engine = engine(320, 240, SceneOptions::default());
    for (frame, mode) in DisplayMode::ALL.iter().cycle().take(12).enumerate() {
        engine.pipeline_mut().set_display_mode(*mode);
        engine.pipeline_mut().set_active_effect(frame % 4);
        engine.update(1.0 / 60.0);
        engine.render().unwrap();
    }
    assert_eq!(engine.backend().frame_index(), 12);
    assert!(engine.backend().violations().is_empty());
}
