//! Deterministic test-pattern sensor

use log::{debug, info};

use super::{CameraDriver, CameraError, FrameBuffer};
use crate::config::{CameraConfig, PixelFormat};

/// Software sensor that renders a diagonal gradient, shifted by one step per
/// frame. Failures can be injected at init and on upcoming captures.
#[derive(Debug, Default)]
pub struct SyntheticCamera {
    config: Option<CameraConfig>,
    buffer: Vec<u8>,
    sequence: u32,
    fail_init: bool,
    failing_captures: u32,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `init` call fail.
    pub fn with_init_failure(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Makes the next `count` captures fail.
    pub fn fail_next_captures(&mut self, count: u32) {
        self.failing_captures = count;
    }

    /// Luma of the pattern at sensor coordinates `(x, y)` for frame `sequence`.
    pub fn pattern_value(x: usize, y: usize, sequence: u32) -> u8 {
        (x.wrapping_add(y).wrapping_add(sequence as usize) & 0xFF) as u8
    }

    fn render(&mut self, config: &CameraConfig) {
        let (width, height) = config.frame_size.dimensions();
        let (width, height) = (width as usize, height as usize);
        let bpp = config.pixel_format.bytes_per_pixel().unwrap_or(1);

        self.buffer.resize(width * height * bpp, 0);

        for y in 0..height {
            let sy = if config.vflip { height - 1 - y } else { y };
            for x in 0..width {
                let sx = if config.hmirror { width - 1 - x } else { x };
                let luma = Self::pattern_value(sx, sy, self.sequence);
                let offset = (y * width + x) * bpp;

                match config.pixel_format {
                    PixelFormat::Grayscale => self.buffer[offset] = luma,
                    // Y0 U Y1 V, neutral chroma
                    PixelFormat::Yuv422 => {
                        self.buffer[offset] = luma;
                        self.buffer[offset + 1] = 128;
                    }
                    PixelFormat::Rgb565 => {
                        let value = gray_to_rgb565(luma);
                        self.buffer[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
                    }
                    // rejected at init
                    PixelFormat::Jpeg => {}
                }
            }
        }
    }
}

fn gray_to_rgb565(luma: u8) -> u16 {
    let luma = u16::from(luma);
    let r = (luma >> 3) << 11;
    let g = (luma >> 2) << 5;
    let b = luma >> 3;
    r | g | b
}

impl CameraDriver for SyntheticCamera {
    fn init(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        if self.fail_init {
            self.fail_init = false;
            return Err(CameraError::Init("synthetic sensor probe failed".to_string()));
        }

        if config.pixel_format.is_compressed() {
            return Err(CameraError::UnsupportedFormat(config.pixel_format));
        }

        let (width, height) = config.frame_size.dimensions();
        info!(
            target: "camera",
            "Synthetic sensor ready: {}x{} {:?}",
            width, height, config.pixel_format
        );

        self.config = Some(config.clone());
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<FrameBuffer<'_>, CameraError> {
        let config = self.config.clone().ok_or(CameraError::NotInitialized)?;

        if self.failing_captures > 0 {
            self.failing_captures -= 1;
            return Err(CameraError::Capture("injected frame drop".to_string()));
        }

        self.render(&config);
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        debug!(target: "camera", "Synthetic frame {}", sequence);

        let (width, height) = config.frame_size.dimensions();
        Ok(FrameBuffer {
            width: width as usize,
            height: height as usize,
            format: config.pixel_format,
            sequence,
            data: &self.buffer,
        })
    }

    fn deinit(&mut self) {
        self.config = None;
        self.buffer.clear();
    }

    fn is_initialized(&self) -> bool {
        self.config.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameSize;

    #[test]
    fn test_capture_requires_init() {
        let mut camera = SyntheticCamera::new();
        assert!(matches!(camera.capture(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_frames_follow_pattern() {
        let mut camera = SyntheticCamera::new();
        camera.init(&CameraConfig::default()).unwrap();

        let frame = camera.capture().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.len(), 160 * 120);
        assert_eq!(frame.data[0], 0);
        assert_eq!(frame.data[160 + 3], SyntheticCamera::pattern_value(3, 1, 0));

        let frame = camera.capture().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.data[0], 1);
    }

    #[test]
    fn test_flip_and_mirror() {
        let mut config = CameraConfig::default();
        config.vflip = true;
        config.hmirror = true;

        let mut camera = SyntheticCamera::new();
        camera.init(&config).unwrap();
        let frame = camera.capture().unwrap();

        // Top-left now shows the bottom-right corner of the scene
        assert_eq!(frame.data[0], SyntheticCamera::pattern_value(159, 119, 0));
    }

    #[test]
    fn test_injected_failures() {
        let mut camera = SyntheticCamera::new().with_init_failure();
        assert!(matches!(
            camera.init(&CameraConfig::default()),
            Err(CameraError::Init(_))
        ));
        camera.init(&CameraConfig::default()).unwrap();

        camera.fail_next_captures(2);
        assert!(camera.capture().is_err());
        assert!(camera.capture().is_err());
        assert!(camera.capture().is_ok());
    }

    #[test]
    fn test_jpeg_rejected() {
        let mut config = CameraConfig::default();
        config.pixel_format = PixelFormat::Jpeg;
        config.frame_size = FrameSize::Vga;

        let mut camera = SyntheticCamera::new();
        assert!(matches!(
            camera.init(&config),
            Err(CameraError::UnsupportedFormat(PixelFormat::Jpeg))
        ));
        assert!(!camera.is_initialized());
    }

    #[test]
    fn test_rgb565_encoding() {
        assert_eq!(gray_to_rgb565(0xFF), 0xFFFF);
        assert_eq!(gray_to_rgb565(0), 0);
    }
}
