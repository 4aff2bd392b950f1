use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::Path;

const PLACEHOLDER_SIZE: u32 = 8;
const PLACEHOLDER_DARK: [u8; 4] = [64, 64, 64, 255];
const PLACEHOLDER_LIGHT: [u8; 4] = [192, 192, 192, 255];

/// CPU-side RGBA8 texture with its mip chain, level 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub levels: Vec<Vec<u8>>,
    pub placeholder: bool,
}

impl TextureData {
    /// Checkerboard bound wherever a real asset is missing.
    pub fn placeholder() -> Self {
        let image = RgbaImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba(PLACEHOLDER_DARK)
            } else {
                image::Rgba(PLACEHOLDER_LIGHT)
            }
        });
        Self {
            label: "placeholder".to_string(),
            width: PLACEHOLDER_SIZE,
            height: PLACEHOLDER_SIZE,
            levels: vec![image.into_raw()],
            placeholder: true,
        }
    }

    /// Decode an image file, flipping and building mips as requested.
    pub fn try_load(path: &Path, vflip: bool, mipmaps: bool) -> Result<Self, image::ImageError> {
        let mut image = image::open(path)?.to_rgba8();
        if vflip {
            imageops::flip_vertical_in_place(&mut image);
        }
        Ok(Self::from_image(path.display().to_string(), image, mipmaps))
    }

    /// Like [`TextureData::try_load`] but degrades to the placeholder.
    pub fn load(path: &Path, vflip: bool, mipmaps: bool) -> Self {
        match Self::try_load(path, vflip, mipmaps) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!(
                    "Failed to load texture {}: {}. Using placeholder.",
                    path.display(),
                    e
                );
                Self::placeholder()
            }
        }
    }

    pub fn from_image(label: String, image: RgbaImage, mipmaps: bool) -> Self {
        let (width, height) = image.dimensions();
        let levels = if mipmaps {
            mip_chain(image)
        } else {
            vec![image]
        };
        Self {
            label,
            width,
            height,
            levels: levels.into_iter().map(RgbaImage::into_raw).collect(),
            placeholder: false,
        }
    }

    pub fn mip_level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// All levels back to back, the layout wgpu expects for a single layer.
    pub fn bytes(&self) -> Vec<u8> {
        self.levels.concat()
    }
}

fn mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let mut levels = vec![base];
    loop {
        let last = &levels[levels.len() - 1];
        let (w, h) = last.dimensions();
        if w <= 1 && h <= 1 {
            break;
        }
        let next = imageops::resize(last, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle);
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_checkerboard() {
        let placeholder = TextureData::placeholder();
        assert!(placeholder.placeholder);
        assert_eq!(placeholder.levels.len(), 1);
        assert_eq!(placeholder.levels[0].len(), 8 * 8 * 4);
        assert_eq!(&placeholder.levels[0][0..4], &PLACEHOLDER_DARK);
        assert_eq!(&placeholder.levels[0][4..8], &PLACEHOLDER_LIGHT);
    }

    #[test]
    fn test_missing_file_degrades_to_placeholder() {
        let texture = TextureData::load(Path::new("/no/such/texture.png"), false, true);
        assert!(texture.placeholder);
        assert!(TextureData::try_load(Path::new("/no/such/texture.png"), false, false).is_err());
    }

    #[test]
    fn test_loads_png_with_vflip_and_mips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripe.png");
        let image = RgbaImage::from_fn(4, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        image.save(&path).unwrap();

        let flat = TextureData::try_load(&path, false, false).unwrap();
        assert_eq!((flat.width, flat.height), (4, 2));
        assert_eq!(flat.mip_level_count(), 1);
        assert_eq!(&flat.levels[0][0..4], &[255, 0, 0, 255]);

        let flipped = TextureData::try_load(&path, true, true).unwrap();
        assert_eq!(&flipped.levels[0][0..4], &[0, 0, 255, 255]);
        // 4x2 -> 2x1 -> 1x1
        assert_eq!(flipped.mip_level_count(), 3);
        assert_eq!(flipped.levels[2].len(), 4);
        assert_eq!(flipped.bytes().len(), (8 + 2 + 1) * 4);
    }

    #[test]
    fn test_undecodable_file_degrades_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(TextureData::load(&path, false, false).placeholder);
    }
}
