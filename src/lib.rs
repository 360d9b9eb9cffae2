//! Camera image source for embedded inference
//!
//! Configures a camera sensor, captures frames and center-crops them into
//! the caller's model input buffer:
//! - [`config`]: sensor pin map, pixel format, frame size and model shape
//! - [`camera`]: the driver seam with V4L2 and synthetic backends
//! - [`crop`]: bounds-checked center crop with format conversion
//! - [`provider`]: init-once / capture-and-crop operations
//! - [`snapshot`]: PNG dumps of the cropped input
//!
//! # Example
//!
//! ```no_run
//! use sensor_image_provider::{Config, ImageProvider, SyntheticCamera};
//!
//! let config = Config::default();
//! let mut provider = ImageProvider::new(SyntheticCamera::new(), config.camera.clone());
//! provider.init_camera()?;
//!
//! let mut input = vec![0u8; config.model.image_size()];
//! provider.get_model_image(&config.model, &mut input)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod camera;
pub mod config;
pub mod crop;
pub mod provider;
pub mod snapshot;

// Re-exports for convenience
#[cfg(target_os = "linux")]
pub use camera::V4lCamera;
pub use camera::{CameraDriver, CameraError, FrameBuffer, SyntheticCamera};
pub use config::{CameraConfig, Config, FrameSize, ModelSettings, PinMap, PixelFormat};
pub use crop::{center_window, crop_center, CropError, CropWindow};
pub use provider::{CaptureStats, ImageProvider, ProviderError};
