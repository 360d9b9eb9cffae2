//! Image source for the inference loop
//!
//! Wraps a [`CameraDriver`] with the two operations the model loop needs:
//! a one-shot camera init, and "grab one frame and center-crop it into my
//! input tensor".

use log::{debug, error, info};
use thiserror::Error;

use crate::camera::{CameraDriver, CameraError};
use crate::config::{CameraConfig, ModelSettings};
use crate::crop::{crop_center, CropError, CropWindow};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("capture failed: {0}")]
    Capture(#[from] CameraError),

    #[error("crop failed: {0}")]
    Crop(#[from] CropError),
}

/// Counters since the provider was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub crop_failures: u64,
}

pub struct ImageProvider<D> {
    driver: D,
    camera: CameraConfig,
    stats: CaptureStats,
}

impl<D: CameraDriver> ImageProvider<D> {
    pub fn new(driver: D, camera: CameraConfig) -> Self {
        Self {
            driver,
            camera,
            stats: CaptureStats::default(),
        }
    }

    /// Initializes the sensor once with the stored configuration.
    pub fn init_camera(&mut self) -> Result<(), CameraError> {
        let (width, height) = self.camera.frame_size.dimensions();
        info!(
            target: "camera",
            "Initializing camera: {:?} {}x{}, xclk {} Hz, {} frame buffer(s)",
            self.camera.pixel_format,
            width,
            height,
            self.camera.xclk_freq_hz,
            self.camera.fb_count
        );

        self.driver.init(&self.camera).map_err(|e| {
            error!(target: "camera", "Camera Init Failed: {}", e);
            e
        })
    }

    /// Captures one frame and copies its centered `image_width`x`image_height`
    /// region into `image_data`.
    ///
    /// The frame is handed back to the driver before this returns, on every path.
    pub fn get_image(
        &mut self,
        image_width: usize,
        image_height: usize,
        channels: usize,
        image_data: &mut [u8],
    ) -> Result<CropWindow, ProviderError> {
        let frame = match self.driver.capture() {
            Ok(frame) => frame,
            Err(e) => {
                error!(target: "camera", "Camera Capture Failed: {}", e);
                self.stats.capture_failures += 1;
                return Err(e.into());
            }
        };
        self.stats.frames_captured += 1;

        let result = crop_center(&frame, image_width, image_height, channels, image_data);
        let sequence = frame.sequence;
        drop(frame);

        match result {
            Ok(window) => {
                debug!(
                    target: "camera",
                    "Frame {} cropped at ({}, {}) to {}x{}",
                    sequence, window.x, window.y, window.width, window.height
                );
                Ok(window)
            }
            Err(e) => {
                error!(target: "camera", "Frame {} crop failed: {}", sequence, e);
                self.stats.crop_failures += 1;
                Err(e.into())
            }
        }
    }

    /// [`get_image`](Self::get_image) with the model's input shape.
    pub fn get_model_image(
        &mut self,
        model: &ModelSettings,
        image_data: &mut [u8],
    ) -> Result<CropWindow, ProviderError> {
        self.get_image(model.image_width, model.image_height, model.channels, image_data)
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn camera_config(&self) -> &CameraConfig {
        &self.camera
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Releases the sensor and returns the driver.
    pub fn into_driver(mut self) -> D {
        self.driver.deinit();
        self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticCamera;

    fn provider() -> ImageProvider<SyntheticCamera> {
        ImageProvider::new(SyntheticCamera::new(), CameraConfig::default())
    }

    #[test]
    fn test_get_image_before_init() {
        let mut provider = provider();
        let mut out = vec![0u8; 96 * 96];

        let err = provider.get_image(96, 96, 1, &mut out).unwrap_err();
        assert!(matches!(err, ProviderError::Capture(CameraError::NotInitialized)));
        assert_eq!(err.to_string(), "capture failed: camera not initialized");
        assert_eq!(provider.stats().capture_failures, 1);
    }

    #[test]
    fn test_init_failure_is_reported() {
        let mut provider =
            ImageProvider::new(SyntheticCamera::new().with_init_failure(), CameraConfig::default());
        assert!(provider.init_camera().is_err());
        assert!(!provider.driver().is_initialized());
    }

    #[test]
    fn test_get_image_crops_center() {
        let mut provider = provider();
        provider.init_camera().unwrap();

        let mut out = vec![0u8; 96 * 96];
        let window = provider.get_image(96, 96, 1, &mut out).unwrap();
        assert_eq!((window.x, window.y), (32, 12));
        assert_eq!(out[0], SyntheticCamera::pattern_value(32, 12, 0));
        assert_eq!(out[96 * 95 + 95], SyntheticCamera::pattern_value(127, 107, 0));

        let stats = provider.stats();
        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.capture_failures, 0);
    }

    #[test]
    fn test_crop_failure_counts() {
        let mut provider = provider();
        provider.init_camera().unwrap();

        let mut out = vec![0u8; 200 * 96];
        let err = provider.get_image(200, 96, 1, &mut out).unwrap_err();
        assert!(matches!(err, ProviderError::Crop(CropError::FrameTooSmall { .. })));
        assert!(err.to_string().starts_with("crop failed"), "{}", err);

        let stats = provider.stats();
        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.crop_failures, 1);
    }

    #[test]
    fn test_into_driver_deinits() {
        let mut provider = provider();
        provider.init_camera().unwrap();
        let driver = provider.into_driver();
        assert!(!driver.is_initialized());
    }
}
