//! Camera driver seam and frame buffer type

#[cfg(all(
    feature = "sensor-gpio",
    any(target_arch = "arm", target_arch = "aarch64")
))]
pub mod gpio;
mod synthetic;
#[cfg(target_os = "linux")]
mod v4l2;

pub use synthetic::SyntheticCamera;
#[cfg(target_os = "linux")]
pub use v4l2::V4lCamera;

use thiserror::Error;

use crate::config::{CameraConfig, PixelFormat};

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera init failed: {0}")]
    Init(String),

    #[error("camera not initialized")]
    NotInitialized,

    #[error("camera capture failed: {0}")]
    Capture(String),

    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(all(
        feature = "sensor-gpio",
        any(target_arch = "arm", target_arch = "aarch64")
    ))]
    #[error("sensor GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// One captured frame, borrowed from the driver.
///
/// The driver owns the underlying buffer. Holding a `FrameBuffer` keeps the
/// driver mutably borrowed, so the buffer is handed back before the next
/// capture can start.
#[derive(Debug)]
pub struct FrameBuffer<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    /// Driver frame counter
    pub sequence: u32,
    pub data: &'a [u8],
}

impl FrameBuffer<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes one row occupies, `None` for compressed frames
    pub fn stride(&self) -> Option<usize> {
        self.format.bytes_per_pixel().map(|bpp| bpp * self.width)
    }
}

/// A sensor driver the image provider can pull frames from.
pub trait CameraDriver {
    /// Configures the sensor. Called once; no retry is attempted on failure.
    fn init(&mut self, config: &CameraConfig) -> Result<(), CameraError>;

    /// Blocks until the next frame is available.
    fn capture(&mut self) -> Result<FrameBuffer<'_>, CameraError>;

    /// Releases the sensor. Safe to call when not initialized.
    fn deinit(&mut self);

    fn is_initialized(&self) -> bool;
}

impl<D: CameraDriver + ?Sized> CameraDriver for Box<D> {
    fn init(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        (**self).init(config)
    }

    fn capture(&mut self) -> Result<FrameBuffer<'_>, CameraError> {
        (**self).capture()
    }

    fn deinit(&mut self) {
        (**self).deinit()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_stride() {
        let data = vec![0u8; 160 * 120 * 2];
        let frame = FrameBuffer {
            width: 160,
            height: 120,
            format: PixelFormat::Yuv422,
            sequence: 0,
            data: &data,
        };
        assert_eq!(frame.stride(), Some(320));
        assert_eq!(frame.len(), 160 * 120 * 2);

        let jpeg = FrameBuffer {
            format: PixelFormat::Jpeg,
            ..frame
        };
        assert_eq!(jpeg.stride(), None);
    }

    #[test]
    fn test_boxed_driver_delegates() {
        let mut driver: Box<dyn CameraDriver> = Box::new(SyntheticCamera::new());
        assert!(!driver.is_initialized());
        driver.init(&CameraConfig::default()).unwrap();
        assert!(driver.is_initialized());

        let frame = driver.capture().unwrap();
        assert_eq!((frame.width, frame.height), (160, 120));
    }
}
