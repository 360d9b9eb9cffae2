//! Camera, model and application configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Highest XCLK the sensor accepts. 10 MHz is also fine and halves the pixel rate.
pub const MAX_XCLK_FREQ_HZ: u32 = 20_000_000;

/// Sensor pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    Grayscale,
    Yuv422,
    Rgb565,
    Jpeg,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats, `None` for JPEG.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Grayscale => Some(1),
            PixelFormat::Yuv422 | PixelFormat::Rgb565 => Some(2),
            PixelFormat::Jpeg => None,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.bytes_per_pixel().is_none()
    }
}

/// Sensor output resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameSize {
    Qqvga,
    Qcif,
    Hqvga,
    Qvga,
    Cif,
    Vga,
    Svga,
    Xga,
    Sxga,
    Uxga,
}

impl FrameSize {
    /// (width, height) in pixels
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qcif => (176, 144),
            FrameSize::Hqvga => (240, 176),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}

/// GPIO wiring between the host and the sensor module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    /// Power-down line, absent when not wired
    #[serde(default)]
    pub pwdn: Option<u8>,

    /// Reset line, absent when the sensor is only soft-reset over SCCB
    #[serde(default)]
    pub reset: Option<u8>,

    pub xclk: u8,
    pub sccb_sda: u8,
    pub sccb_scl: u8,

    /// D0 through D7
    pub data_pins: [u8; 8],

    pub vsync: u8,
    pub href: u8,
    pub pclk: u8,
}

impl PinMap {
    /// M5Stack camera board wiring
    pub fn m5stack() -> Self {
        Self {
            pwdn: None,
            reset: Some(15),
            xclk: 27,
            sccb_sda: 22,
            sccb_scl: 23,
            data_pins: [32, 35, 34, 5, 39, 18, 36, 19],
            vsync: 25,
            href: 26,
            pclk: 21,
        }
    }

    /// Every wired signal with its GPIO number
    pub fn assignments(&self) -> Vec<(String, u8)> {
        let mut pins = Vec::with_capacity(16);
        if let Some(pwdn) = self.pwdn {
            pins.push(("pwdn".to_string(), pwdn));
        }
        if let Some(reset) = self.reset {
            pins.push(("reset".to_string(), reset));
        }
        pins.push(("xclk".to_string(), self.xclk));
        pins.push(("sccb_sda".to_string(), self.sccb_sda));
        pins.push(("sccb_scl".to_string(), self.sccb_scl));
        for (i, pin) in self.data_pins.iter().enumerate() {
            pins.push((format!("d{}", i), *pin));
        }
        pins.push(("vsync".to_string(), self.vsync));
        pins.push(("href".to_string(), self.href));
        pins.push(("pclk".to_string(), self.pclk));
        pins
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::m5stack()
    }
}

/// Sensor configuration handed to the camera driver at init
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub pins: PinMap,

    #[serde(default = "default_xclk_freq_hz")]
    pub xclk_freq_hz: u32,

    #[serde(default)]
    pub ledc_timer: u8,

    #[serde(default)]
    pub ledc_channel: u8,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: PixelFormat,

    /// Sizes above QVGA require JPEG
    #[serde(default = "default_frame_size")]
    pub frame_size: FrameSize,

    /// 0-63, lower number means higher quality
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// More than one buffer puts the sensor in continuous mode
    #[serde(default = "default_fb_count")]
    pub fb_count: u32,

    #[serde(default)]
    pub vflip: bool,

    #[serde(default)]
    pub hmirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),
            xclk_freq_hz: default_xclk_freq_hz(),
            ledc_timer: 0,
            ledc_channel: 0,
            pixel_format: default_pixel_format(),
            frame_size: default_frame_size(),
            jpeg_quality: default_jpeg_quality(),
            fb_count: default_fb_count(),
            vflip: false,
            hmirror: false,
        }
    }
}

/// Input tensor shape of the downstream model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_side")]
    pub image_width: usize,

    #[serde(default = "default_model_side")]
    pub image_height: usize,

    #[serde(default = "default_channels")]
    pub channels: usize,
}

impl ModelSettings {
    pub fn image_size(&self) -> usize {
        self.image_width * self.image_height * self.channels
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            image_width: default_model_side(),
            image_height: default_model_side(),
            channels: default_channels(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// V4L2 device node
    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default = "default_capture_interval_ms")]
    pub capture_interval_ms: u64,

    /// Cropped frames are written here as PNG when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            capture_interval_ms: default_capture_interval_ms(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub app: AppConfig,
}

// Default value functions
fn default_xclk_freq_hz() -> u32 {
    MAX_XCLK_FREQ_HZ
}
fn default_pixel_format() -> PixelFormat {
    PixelFormat::Grayscale
}
fn default_frame_size() -> FrameSize {
    FrameSize::Qqvga
}
fn default_jpeg_quality() -> u8 {
    12
}
fn default_fb_count() -> u32 {
    1
}
fn default_model_side() -> usize {
    96
}
fn default_channels() -> usize {
    1
}
fn default_device() -> String {
    "/dev/video0".to_string()
}
fn default_capture_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.validate_model()
    }

    fn validate_model(&self) -> Result<(), ConfigError> {
        let model = &self.model;

        if model.image_width == 0 || model.image_height == 0 {
            return Err(ConfigError::Invalid(
                "model: image_width and image_height must be > 0".to_string(),
            ));
        }

        if model.channels != 1 && model.channels != 3 {
            return Err(ConfigError::Invalid(format!(
                "model: channels must be 1 or 3, got {}",
                model.channels
            )));
        }

        let (frame_width, frame_height) = self.camera.frame_size.dimensions();
        if model.image_width > frame_width as usize || model.image_height > frame_height as usize
        {
            return Err(ConfigError::Invalid(format!(
                "model: {}x{} does not fit in a {:?} frame ({}x{})",
                model.image_width,
                model.image_height,
                self.camera.frame_size,
                frame_width,
                frame_height
            )));
        }

        Ok(())
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<u8, String> = HashMap::new();
        for (signal, pin) in self.pins.assignments() {
            if let Some(other) = seen.insert(pin, signal.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "camera: GPIO {} assigned to both {} and {}",
                    pin, other, signal
                )));
            }
        }

        if self.xclk_freq_hz == 0 || self.xclk_freq_hz > MAX_XCLK_FREQ_HZ {
            return Err(ConfigError::Invalid(format!(
                "camera: xclk_freq_hz must be between 1 and {}, got {}",
                MAX_XCLK_FREQ_HZ, self.xclk_freq_hz
            )));
        }

        if self.jpeg_quality > 63 {
            return Err(ConfigError::Invalid(format!(
                "camera: jpeg_quality must be between 0 and 63, got {}",
                self.jpeg_quality
            )));
        }

        if self.fb_count == 0 {
            return Err(ConfigError::Invalid(
                "camera: fb_count must be >= 1".to_string(),
            ));
        }

        if !self.pixel_format.is_compressed() && self.frame_size > FrameSize::Qvga {
            return Err(ConfigError::Invalid(format!(
                "camera: {:?} frames above QVGA need JPEG, got {:?}",
                self.pixel_format, self.frame_size
            )));
        }

        Ok(())
    }
}
