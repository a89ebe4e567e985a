//! Texture loading and management

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::PipelineResult;
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Stable texture identity, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Loaded RGBA8 texture data
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path)?;
        log::info!("Loaded texture '{}' from {}", name, path.display());
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> PipelineResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Fallback for material textures that were never set
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    pub fn black() -> Self {
        Self::solid_color([0, 0, 0, 255], "black")
    }

    /// Create a checkerboard texture with 8-texel squares
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: "checkerboard".to_string(),
        }
    }

    /// Vertical gradient usable as an equirectangular sky, zenith at row 0
    pub fn sky_gradient(width: u32, height: u32, zenith: [u8; 3], horizon: [u8; 3], ground: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        let lerp = |a: [u8; 3], b: [u8; 3], t: f32| -> [u8; 4] {
            let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
            [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 255]
        };

        for y in 0..height {
            let v = y as f32 / (height.max(2) - 1) as f32;
            let color = if v < 0.5 {
                lerp(zenith, horizon, v * 2.0)
            } else {
                lerp(horizon, ground, (v - 0.5) * 2.0)
            };
            for _ in 0..width {
                data.extend_from_slice(&color);
            }
        }

        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: "sky_gradient".to_string(),
        }
    }
}

/// GPU texture with its view
#[derive(Debug, Clone, Copy)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// Create and upload texture to GPU
    pub fn create(backend: &mut dyn GraphicsBackend, data: &TextureData) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let view = backend.create_texture_view(handle)?;
        backend.write_texture(handle, &data.data, data.width, data.height);

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
        })
    }
}

/// Registry of CPU-side texture data
#[derive(Debug, Default)]
pub struct TextureRegistry {
    textures: Vec<TextureData>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, data: TextureData) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(data);
        id
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sky_gradient_endpoints() {
        let sky = TextureData::sky_gradient(4, 3, [0, 0, 255], [255, 255, 255], [0, 0, 0]);
        assert_eq!(sky.data.len(), 4 * 3 * 4);
        assert_eq!(&sky.data[0..4], &[0, 0, 255, 255]);
        let last = sky.data.len() - 4;
        assert_eq!(&sky.data[last..], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(TextureData::from_bytes(&[1, 2, 3], "garbage").is_err());
    }
}
