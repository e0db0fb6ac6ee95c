use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::scene::{AssetError, AssetResult};

pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA8 data, first row is the top of the image
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Texture {
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> AssetResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(AssetError::InvalidTexture {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn load(path: &Path) -> AssetResult<Self> {
        let img = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded texture {} ({}x{})", path.display(), width, height);
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    // Nearest texel with repeat wrapping. v=0 is the bottom row of the image.
    pub fn sample(&self, u: f64, v: f64) -> [u8; 4] {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;

        let u = u - u.floor();
        let v = v - v.floor();

        // Rounding can overshoot by one texel at the wrap boundary
        let x = (max_x * u).round().clamp(0.0, max_x) as usize;
        let y = (max_y - (max_y * v).round()).clamp(0.0, max_y) as usize;

        let index = (y * self.width as usize + x) * 4;
        [
            self.data[index],
            self.data[index + 1],
            self.data[index + 2],
            self.data[index + 3],
        ]
    }
}

// Textures keyed by file path so that materials sharing an image share one allocation
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<PathBuf, Arc<Texture>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }

    pub fn get_or_load(&mut self, path: &Path) -> AssetResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(Arc::clone(texture));
        }
        let texture = Arc::new(Texture::load(path)?);
        self.textures
            .insert(path.to_path_buf(), Arc::clone(&texture));
        Ok(texture)
    }

    pub fn unique_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn total_texture_data_size(&self) -> usize {
        self.textures
            .values()
            .map(|texture| texture.data.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2x2: top row red, green; bottom row blue, white
    fn quad() -> Texture {
        Texture::from_rgba8(
            2,
            2,
            vec![
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 255, 255, 255, 255,
            ],
        )
        .unwrap()
    }

    #[test]
    fn wraps_coordinates() {
        let t = quad();
        assert_eq!(t.sample(1.5, 0.5), t.sample(0.5, 0.5));
        assert_eq!(t.sample(-0.75, 0.1), t.sample(0.25, 0.1));
        assert_eq!(t.sample(0.2, 3.2), t.sample(0.2, 0.2));
    }

    #[test]
    fn v_zero_is_bottom_row() {
        let t = quad();
        assert_eq!(t.sample(0.0, 0.0), [0, 0, 255, 255]);
        assert_eq!(t.sample(0.9, 0.0), [255, 255, 255, 255]);
        assert_eq!(t.sample(0.0, 0.9), [255, 0, 0, 255]);
        assert_eq!(t.sample(0.9, 0.9), [0, 255, 0, 255]);
    }

    #[test]
    fn single_texel_texture() {
        let t = Texture::from_rgba8(1, 1, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(t.sample(0.7, 12.3), [1, 2, 3, 4]);
    }

    #[test]
    fn non_finite_coordinates_do_not_panic() {
        let t = quad();
        t.sample(f64::NAN, f64::INFINITY);
    }

    #[test]
    fn rejects_mismatched_data() {
        assert!(Texture::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(Texture::from_rgba8(0, 2, vec![]).is_err());
    }
}
