//! Material shaders and WGSL validation
//!
//! A material shader is registered as a WGSL body. Registration prepends the
//! geometry prelude (frame, object and shadow bindings, vertex and G-buffer
//! output structs) and a generated material block: one `u_<name>()` accessor
//! per declared uniform and one `t_<name>` texture per declared texture.
//! The assembled module is validated with naga before it is accepted.

use crate::error::ShaderError;
use std::fmt::Write as _;

/// Uniform slots available to a material, each one `vec4<f32>`
pub const MAX_MATERIAL_UNIFORMS: usize = 8;
/// Textures available to a material, bound from binding 2 upward
pub const MAX_MATERIAL_TEXTURES: usize = 4;

/// Stable shader identity, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Bindings and structs shared by every geometry-pass shader
pub const GEOMETRY_PRELUDE: &str = r#"
struct FrameUniform {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    light_space: mat4x4<f32>,
    camera_position: vec4<f32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

struct MaterialBlock {
    values: array<vec4<f32>, 8>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniform;
@group(1) @binding(0) var<uniform> object: ObjectUniform;
@group(2) @binding(0) var<uniform> material: MaterialBlock;
@group(2) @binding(1) var material_sampler: sampler;
@group(3) @binding(0) var shadow_map: texture_depth_2d;
@group(3) @binding(1) var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct GBufferOutput {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) specular: vec4<f32>,
    @location(3) position: vec4<f32>,
}
"#;

/// Textured Blinn-Phong surface: two blended diffuse maps and a specular map
pub const STANDARD_SHADER_BODY: &str = r#"
@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = object.model * vec4<f32>(in.position, 1.0);
    out.world_position = world.xyz;
    out.world_normal = normalize((object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    out.clip_position = frame.view_proj * world;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    let base = textureSample(t_diffuse, material_sampler, in.uv);
    let overlay = textureSample(t_diffuse2, material_sampler, in.uv);
    let specular = textureSample(t_specular, material_sampler, in.uv).r;
    out.albedo = vec4<f32>(mix(base.rgb, overlay.rgb, u_texture_mix().x), 1.0);
    out.normal = vec4<f32>(normalize(in.world_normal), 0.0);
    // Shininess is stored scaled to fit the unorm target
    out.specular = vec4<f32>(specular, u_shininess().x / 255.0, 0.0, 1.0);
    out.position = vec4<f32>(in.world_position, 1.0);
    return out;
}
"#;

pub const STANDARD_SHADER_UNIFORMS: &[&str] = &["shininess", "texture_mix"];
pub const STANDARD_SHADER_TEXTURES: &[&str] = &["diffuse", "diffuse2", "specular"];

/// Equirectangular environment on an inverted sphere that follows the camera
pub const SKYBOX_SHADER_BODY: &str = r#"
const PI: f32 = 3.14159265;

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let offset = (object.model * vec4<f32>(in.position, 0.0)).xyz;
    let clip = frame.view_proj * vec4<f32>(offset + frame.camera_position.xyz, 1.0);
    // Pin to the far plane
    out.clip_position = clip.xyww;
    out.world_position = in.position;
    out.world_normal = -in.normal;
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    let dir = normalize(in.world_position);
    let uv = vec2<f32>(atan2(dir.y, dir.x) / (2.0 * PI) + 0.5, acos(clamp(dir.z, -1.0, 1.0)) / PI);
    out.albedo = textureSampleLevel(t_environment, material_sampler, uv, 0.0);
    out.normal = vec4<f32>(0.0);
    out.specular = vec4<f32>(0.0);
    // w == 0 marks background for the lighting pass
    out.position = vec4<f32>(0.0);
    return out;
}
"#;

pub const SKYBOX_SHADER_TEXTURES: &[&str] = &["environment"];

/// A validated material shader
#[derive(Debug, Clone)]
pub struct Shader {
    pub id: ShaderId,
    pub name: String,
    /// Complete WGSL module, prelude included
    pub source: String,
    pub uniform_names: Vec<String>,
    pub texture_names: Vec<String>,
}

impl Shader {
    /// Slot of a uniform in the material block
    pub fn uniform_slot(&self, name: &str) -> Option<usize> {
        self.uniform_names.iter().position(|n| n == name)
    }

    /// Index of a texture among the material textures
    pub fn texture_slot(&self, name: &str) -> Option<usize> {
        self.texture_names.iter().position(|n| n == name)
    }
}

/// Parse and validate a WGSL module, requiring the given entry points
pub fn validate_wgsl(name: &str, source: &str, entry_points: &[&str]) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        name: name.to_string(),
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Validation {
        name: name.to_string(),
        message: format!("{:?}", e.into_inner()),
    })?;

    for entry in entry_points {
        if !module.entry_points.iter().any(|ep| ep.name == *entry) {
            return Err(ShaderError::MissingEntryPoint {
                name: name.to_string(),
                entry: entry.to_string(),
            });
        }
    }

    Ok(module)
}

/// Generate the material block accessors for a shader's declared names
fn material_block(uniforms: &[&str], textures: &[&str]) -> String {
    let mut block = String::new();
    for (slot, name) in uniforms.iter().enumerate() {
        let _ = writeln!(
            block,
            "fn u_{}() -> vec4<f32> {{ return material.values[{}]; }}",
            name, slot
        );
    }
    for (slot, name) in textures.iter().enumerate() {
        let _ = writeln!(
            block,
            "@group(2) @binding({}) var t_{}: texture_2d<f32>;",
            slot + 2,
            name
        );
    }
    block
}

/// Registry handing out monotonically increasing shader ids
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    shaders: Vec<Shader>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble, validate and register a material shader
    pub fn register(
        &mut self,
        name: &str,
        body: &str,
        uniforms: &[&str],
        textures: &[&str],
    ) -> Result<ShaderId, ShaderError> {
        if uniforms.len() > MAX_MATERIAL_UNIFORMS {
            return Err(ShaderError::TooManyBindings {
                name: name.to_string(),
                kind: "uniforms",
                count: uniforms.len(),
                max: MAX_MATERIAL_UNIFORMS,
            });
        }
        if textures.len() > MAX_MATERIAL_TEXTURES {
            return Err(ShaderError::TooManyBindings {
                name: name.to_string(),
                kind: "textures",
                count: textures.len(),
                max: MAX_MATERIAL_TEXTURES,
            });
        }

        let source = format!("{}\n{}\n{}", GEOMETRY_PRELUDE, material_block(uniforms, textures), body);
        validate_wgsl(name, &source, &["vs_main", "fs_main"])?;

        let id = ShaderId(self.shaders.len() as u32);
        log::info!(
            "Registered shader '{}' as {:?} ({} uniforms, {} textures)",
            name,
            id,
            uniforms.len(),
            textures.len()
        );
        self.shaders.push(Shader {
            id,
            name: name.to_string(),
            source,
            uniform_names: uniforms.iter().map(|s| s.to_string()).collect(),
            texture_names: textures.iter().map(|s| s.to_string()).collect(),
        });
        Ok(id)
    }

    /// Register the built-in textured surface shader
    pub fn register_standard(&mut self) -> Result<ShaderId, ShaderError> {
        self.register("standard", STANDARD_SHADER_BODY, STANDARD_SHADER_UNIFORMS, STANDARD_SHADER_TEXTURES)
    }

    /// Register the built-in skybox shader
    pub fn register_skybox(&mut self) -> Result<ShaderId, ShaderError> {
        self.register("skybox", SKYBOX_SHADER_BODY, &[], SKYBOX_SHADER_TEXTURES)
    }

    pub fn get(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shader> {
        self.shaders.iter()
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}
