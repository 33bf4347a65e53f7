//! Concrete, minimal implementations of the collaborators the decoder
//! and analyzer deliberately don't own: the background map image
//! decoder, the animation encoder, and the unit-name catalog. Each sits
//! behind a small trait so a caller can swap in a different
//! implementation without touching the renderer.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode animation: {0}")]
    Encode(#[source] image::ImageError),
}

pub trait BackgroundMapSource {
    fn load(&self, path: &Path) -> Result<RgbImage, CollaboratorError>;
}

/// Decodes whatever raster format the `image` crate supports. Stands in
/// for the game's own proprietary map-texture format.
pub struct FileBackgroundMapSource;

impl BackgroundMapSource for FileBackgroundMapSource {
    fn load(&self, path: &Path) -> Result<RgbImage, CollaboratorError> {
        let reader = ImageReader::open(path).map_err(|source| CollaboratorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let image = reader
            .with_guessed_format()
            .map_err(|source| CollaboratorError::Io {
                path: path.display().to_string(),
                source,
            })?
            .decode()
            .map_err(|source| CollaboratorError::Decode {
                path: path.display().to_string(),
                source,
            })?;
        Ok(image.into_rgb8())
    }
}

/// One rendered, already-paletted frame ready for encoding.
pub struct PalettedFrame {
    pub width: u32,
    pub height: u32,
    /// Palette index per pixel, row-major.
    pub indices: Vec<u8>,
}

pub trait AnimationEncoder {
    fn encode(
        &self,
        palette: &[[u8; 3]; 256],
        frames: &[PalettedFrame],
        out: &mut dyn Write,
    ) -> Result<(), CollaboratorError>;
}

/// GIF animation encoder, `DisposalPrevious` with a fixed 10-centisecond
/// delay, sharing one 256-entry palette across every frame.
pub struct GifAnimationEncoder;

impl AnimationEncoder for GifAnimationEncoder {
    fn encode(
        &self,
        palette: &[[u8; 3]; 256],
        frames: &[PalettedFrame],
        out: &mut dyn Write,
    ) -> Result<(), CollaboratorError> {
        use image::codecs::gif::{DisposalMethod, GifEncoder};
        use image::{Delay, Frame, Rgba, RgbaImage};

        let mut encoder = GifEncoder::new(out);
        for frame in frames {
            let mut rgba = RgbaImage::new(frame.width, frame.height);
            for (i, &idx) in frame.indices.iter().enumerate() {
                let x = (i as u32) % frame.width;
                let y = (i as u32) / frame.width;
                let [r, g, b] = palette[idx as usize];
                let alpha = if idx == 0 { 0 } else { 255 };
                rgba.put_pixel(x, y, Rgba([r, g, b, alpha]));
            }
            let delay = Delay::from_numer_denom_ms(100, 1);
            let mut gif_frame = Frame::from_parts(rgba, 0, 0, delay);
            *gif_frame.dispose_mut() = DisposalMethod::Previous;
            encoder
                .encode_frame(gif_frame)
                .map_err(CollaboratorError::Encode)?;
        }
        Ok(())
    }
}

pub trait UnitCatalog {
    fn name(&self, net_id: u16) -> Option<&str>;
}

/// A `net_id,name` text file loaded into a lookup table, used only for
/// human-readable logging, never for decoding decisions.
#[derive(Debug, Default)]
pub struct FileUnitCatalog {
    names: HashMap<u16, String>,
}

impl FileUnitCatalog {
    pub fn empty() -> Self {
        FileUnitCatalog::default()
    }

    pub fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let file = std::fs::File::open(path).map_err(|source| CollaboratorError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let reader = std::io::BufReader::new(file);
        let mut names = HashMap::new();
        for line in reader.lines() {
            let line = line.map_err(|source| CollaboratorError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if let Some((id_str, name)) = line.split_once(',') {
                if let Ok(id) = id_str.trim().parse::<u16>() {
                    names.insert(id, name.trim().to_string());
                }
            }
        }
        Ok(FileUnitCatalog { names })
    }
}

impl UnitCatalog for FileUnitCatalog {
    fn name(&self, net_id: u16) -> Option<&str> {
        self.names.get(&net_id).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_has_no_names() {
        let catalog = FileUnitCatalog::empty();
        assert_eq!(catalog.name(1), None);
    }
}
