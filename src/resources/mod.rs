//! Resource management
//!
//! Meshes, textures, shaders and materials live in registries that hand out
//! stable, monotonically increasing ids. GPU copies are created lazily by
//! the pipeline.

mod material;
mod mesh;
mod shader;
mod texture;

pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;

/// Every asset registry the pipeline reads from
#[derive(Debug, Default)]
pub struct Assets {
    pub meshes: MeshRegistry,
    pub textures: TextureRegistry,
    pub shaders: ShaderRegistry,
    pub materials: MaterialRegistry,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }
}
