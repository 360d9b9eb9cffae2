//! PNG dumps of cropped model inputs

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use thiserror::Error;

use crate::config::ModelSettings;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("{len} bytes do not form a {width}x{height}x{channels} image")]
    Geometry {
        len: usize,
        width: usize,
        height: usize,
        channels: usize,
    },

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Writes `data` as `frame_<index>.png` under `dir` and returns the path.
pub fn save_input(
    dir: &Path,
    index: u64,
    model: &ModelSettings,
    data: &[u8],
) -> Result<PathBuf, SnapshotError> {
    let geometry = || SnapshotError::Geometry {
        len: data.len(),
        width: model.image_width,
        height: model.image_height,
        channels: model.channels,
    };
    let pixels = data.get(..model.image_size()).ok_or_else(geometry)?.to_vec();
    let (width, height) = (model.image_width as u32, model.image_height as u32);
    let path = dir.join(format!("frame_{:05}.png", index));

    match model.channels {
        1 => GrayImage::from_raw(width, height, pixels)
            .ok_or_else(geometry)?
            .save(&path)?,
        3 => RgbImage::from_raw(width, height, pixels)
            .ok_or_else(geometry)?
            .save(&path)?,
        _ => return Err(geometry()),
    }

    Ok(path)
}
