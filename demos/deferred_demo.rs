//! # Deferred Demo
//!
//! A small brick scene rendered by the deferred pipeline with an egui
//! control panel.
//!
//! Keys: `T` toggles the orthographic camera, `O` shows the colour buffer,
//! `P` shows the light accumulation buffer.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use deferred_pipeline::input::InputWatcher;
use deferred_pipeline::resources::{
    Assets, MaterialId, MaterialValue, Mesh, ShaderId, TextureData, TextureId, LAYER_OPAQUE, LAYER_SKYBOX,
};
use deferred_pipeline::scene::{Behaviour, Behaviours, Camera, DirectionalLight, MeshRenderer, Scene, Transform};
use deferred_pipeline::ui::pipeline_panel;
use deferred_pipeline::{
    EffectKey, Engine, PipelineConfig, PipelineError, PipelineResult, ShadowConfig, Window, WgpuBackend,
    WgpuEguiIntegration,
};
use glam::{Quat, Vec3};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

#[derive(Parser, Debug)]
#[command(name = "deferred_demo", about = "Deferred rendering demo")]
struct Args {
    /// Window width, also the size of every offscreen target
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Window height, also the size of every offscreen target
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Disable vsync
    #[arg(long)]
    no_vsync: bool,

    /// Shadow map resolution
    #[arg(long, default_value_t = 4096)]
    shadow_resolution: u32,

    /// Equirectangular sky image; a generated gradient is used otherwise
    #[arg(long)]
    sky: Option<PathBuf>,

    /// Also register the greyscale and sepia filters
    #[arg(long)]
    color_filters: bool,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        let mut effects = EffectKey::DEFAULT_CATALOG.to_vec();
        if self.color_filters {
            effects.extend([EffectKey::Greyscale, EffectKey::Sepia]);
        }
        PipelineConfig {
            title: "Deferred Pipeline Demo".to_string(),
            width: self.width,
            height: self.height,
            vsync: !self.no_vsync,
            shadow: ShadowConfig {
                resolution: self.shadow_resolution,
                ..Default::default()
            },
            effects,
            ..Default::default()
        }
    }
}

/// Textures shared by the brick materials
struct Palette {
    standard: ShaderId,
    white: TextureId,
    studs: TextureId,
}

impl Palette {
    fn material(&self, assets: &mut Assets, name: &str, color: [u8; 4], shininess: f32) -> MaterialId {
        let texture = assets.textures.add(TextureData::solid_color(color, name));
        let id = assets.materials.create(name, self.standard, LAYER_OPAQUE);
        if let Some(material) = assets.materials.get_mut(id) {
            material.set("diffuse", MaterialValue::Texture(texture));
            material.set("diffuse2", MaterialValue::Texture(self.studs));
            material.set("specular", MaterialValue::Texture(self.white));
            material.set("shininess", MaterialValue::Float(shininess));
            material.set("texture_mix", MaterialValue::Float(0.1));
        }
        id
    }
}

fn build_assets_and_scene(args: &Args) -> PipelineResult<(Assets, Scene)> {
    let mut assets = Assets::new();
    let palette = Palette {
        standard: assets.shaders.register_standard()?,
        white: assets.textures.add(TextureData::white()),
        studs: assets
            .textures
            .add(TextureData::checkerboard(64, [255, 255, 255, 255], [200, 200, 200, 255])),
    };
    let skybox_shader = assets.shaders.register_skybox()?;

    let sky_texture = match &args.sky {
        Some(path) => TextureData::from_file(path)?,
        None => TextureData::sky_gradient(512, 256, [40, 90, 200], [200, 220, 240], [60, 60, 60]),
    };
    let sky_texture = assets.textures.add(sky_texture);
    let sky_material = assets.materials.create("sky", skybox_shader, LAYER_SKYBOX);
    if let Some(material) = assets.materials.get_mut(sky_material) {
        material.set("environment", MaterialValue::Texture(sky_texture));
    }

    let green = palette.material(&mut assets, "green", [40, 160, 60, 255], 16.0);
    let red = palette.material(&mut assets, "red", [200, 30, 30, 255], 32.0);
    let blue = palette.material(&mut assets, "blue", [30, 70, 200, 255], 32.0);
    let yellow = palette.material(&mut assets, "yellow", [250, 200, 20, 255], 64.0);

    let baseplate = assets.meshes.add(Mesh::brick(16, 16));
    let brick_2x4 = assets.meshes.add(Mesh::brick(4, 2));
    let brick_2x2 = assets.meshes.add(Mesh::brick(2, 2));
    let head = assets.meshes.add(Mesh::cylinder(0.45, 0.9, 32));
    let sky = assets.meshes.add(Mesh::sphere(32, 16).invert_faces());

    let mut scene = Scene::new();
    scene.camera = Camera::new(Vec3::new(5.0, -6.0, 5.0), Vec3::new(0.0, 0.0, 2.0));
    scene.spawn_light(DirectionalLight::new(Vec3::new(-1.0, 0.6, -2.0), Vec3::ONE));

    scene.spawn_object(
        Transform::from_position_scale(Vec3::new(0.0, 0.0, -0.3), Vec3::new(1.0, 1.0, 0.25)),
        MeshRenderer::new(baseplate, green),
    );

    // Figure: legs, torso, head
    scene.spawn_object(Transform::from_position(Vec3::ZERO), MeshRenderer::new(brick_2x4, blue));
    scene.spawn_object(
        Transform::from_position(Vec3::new(0.0, 0.0, 1.4)),
        MeshRenderer::new(brick_2x4, red),
    );
    let figure_head = scene.spawn_object(
        Transform::from_position(Vec3::new(0.0, 0.0, 3.5)),
        MeshRenderer::new(head, yellow),
    );
    scene.add_behaviours(
        figure_head,
        Behaviours::new()
            .with(Behaviour::rotate(Vec3::Z, 45.0))
            .with(Behaviour::follow_path(
                vec![Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, 4.0)],
                0.6,
            )),
    );

    // A few loose bricks around the figure
    for (i, position) in [Vec3::new(-4.0, 3.0, 0.0), Vec3::new(4.0, 2.0, 0.0), Vec3::new(3.0, -4.0, 0.0)]
        .into_iter()
        .enumerate()
    {
        let material = [red, blue, yellow][i];
        let rotation = Quat::from_rotation_z(i as f32 * 0.6);
        scene.spawn_object(
            Transform::from_position(position).with_rotation(rotation),
            MeshRenderer::new(brick_2x2, material),
        );
    }

    scene.spawn_object(Transform::default(), MeshRenderer::new(sky, sky_material).without_shadows());

    Ok((assets, scene))
}

/// Everything the event loop drives
struct Demo {
    window: Window,
    engine: Engine<WgpuBackend>,
    egui: WgpuEguiIntegration,
    input: InputWatcher,
    last_frame: Instant,
}

impl Demo {
    fn handle_window_event(&mut self, event: &WindowEvent) {
        self.window.handle_event(event);
        self.egui.on_window_event(self.window.window(), event);
        self.input.handle_event(event);

        if let WindowEvent::Focused(false) = event {
            self.input.reset();
        }
    }

    fn redraw(&mut self) -> PipelineResult<()> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.window.take_resized() {
            let (width, height) = self.window.dimensions();
            self.engine.resize(width, height);
            self.egui
                .update_surface_scale((width, height), self.engine.dimensions());
        }

        let actions = self.input.poll(self.egui.wants_keyboard_input());
        {
            let (pipeline, scene, _) = self.engine.ui_state();
            for action in actions {
                action.apply(pipeline, &mut scene.camera);
            }
        }

        self.engine.update(delta);
        self.engine.render_scene()?;

        let (pipeline, scene, stats) = self.engine.ui_state();
        self.egui.run(self.window.window(), |ctx| {
            pipeline_panel(ctx, pipeline, scene, stats);
        });
        self.egui.render(self.engine.backend_mut());

        self.engine.end_frame()
    }
}

fn run(args: Args) -> PipelineResult<()> {
    let config = args.config();
    let (assets, scene) = build_assets_and_scene(&args)?;

    let event_loop = EventLoop::new().map_err(|e| PipelineError::Window(e.to_string()))?;
    let window = Window::new(&event_loop, &config)?;
    let backend = WgpuBackend::new(window.window_arc(), config.vsync)?;
    let adapter = backend.adapter_info();
    log::info!("Selected GPU: {} ({:?} backend)", adapter.name, adapter.backend);
    let egui = WgpuEguiIntegration::new(&backend, window.window());
    let engine = Engine::new(backend, &config, scene, assets)?;

    let mut demo = Demo {
        window,
        engine,
        egui,
        input: InputWatcher::new(),
        last_frame: Instant::now(),
    };

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => {
                    demo.handle_window_event(&event);
                    match event {
                        WindowEvent::CloseRequested => {
                            log::info!("Close requested, exiting...");
                            elwt.exit();
                        }
                        WindowEvent::RedrawRequested => {
                            if let Err(e) = demo.redraw() {
                                log::error!("Frame failed: {}", e);
                                elwt.exit();
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => demo.window.request_redraw(),
                _ => {}
            }
        })
        .map_err(|e| PipelineError::Window(e.to_string()))
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
