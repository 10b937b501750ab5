// Display surfaces that receive finished frames

use std::path::{Path, PathBuf};

use crate::palette::Frame;

/// Anything that can show or store a finished frame.
pub trait Presenter {
    type Error;

    fn present(&mut self, frame: &Frame) -> Result<(), Self::Error>;
}

/// Writes each presented frame to a PNG file, overwriting the previous one.
pub struct PngSnapshot {
    path: PathBuf,
    frames_written: u64,
}

impl PngSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Presenter for PngSnapshot {
    type Error = image::ImageError;

    fn present(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        let img = image::RgbImage::from_raw(frame.width as u32, frame.height as u32, frame.rgb.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        img.save(&self.path)?;
        self.frames_written += 1;
        log::debug!("wrote frame {}x{} to {}", frame.width, frame.height, self.path.display());
        Ok(())
    }
}
