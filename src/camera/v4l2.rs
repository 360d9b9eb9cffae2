use log::{debug, error, info, warn};
use v4l::{
    buffer::Type,
    control::{Control, Value},
    io::{mmap::Stream as MmapStream, traits::CaptureStream},
    video::Capture,
    Device, Format, FourCC,
};

use super::{CameraDriver, CameraError, FrameBuffer};
use crate::config::{CameraConfig, PixelFormat};

const V4L2_CID_HFLIP: u32 = 0x0098_0914;
const V4L2_CID_VFLIP: u32 = 0x0098_0915;

/// How raw device buffers are turned into packed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    /// Device format matches the requested one
    Native,
    /// Device only offers YUYV, keep the Y samples
    YuyvLuma,
}

fn fourcc_for(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Grayscale => FourCC::new(b"GREY"),
        PixelFormat::Yuv422 => FourCC::new(b"YUYV"),
        // big-endian RGB565
        PixelFormat::Rgb565 => FourCC::new(b"RGBR"),
        PixelFormat::Jpeg => FourCC::new(b"MJPG"),
    }
}

struct Session {
    stream: MmapStream<'static>,
    format: PixelFormat,
    width: usize,
    height: usize,
    stride: usize,
    conversion: Conversion,
}

/// Sensor exposed by a kernel V4L2 driver.
pub struct V4lCamera {
    path: String,
    device: Option<Device>,
    session: Option<Session>,
    scratch: Vec<u8>,
}

impl V4lCamera {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            device: None,
            session: None,
            scratch: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn apply_orientation(device: &Device, config: &CameraConfig) {
        for (id, enabled, name) in [
            (V4L2_CID_VFLIP, config.vflip, "vflip"),
            (V4L2_CID_HFLIP, config.hmirror, "hmirror"),
        ] {
            if !enabled {
                continue;
            }
            let control = Control {
                id,
                value: Value::Boolean(true),
            };
            if let Err(e) = device.set_control(control) {
                warn!(target: "camera", "Sensor does not accept {}: {}", name, e);
            }
        }
    }

    fn negotiate(device: &Device, config: &CameraConfig) -> Result<(Format, Conversion), CameraError> {
        let (width, height) = config.frame_size.dimensions();
        let requested = fourcc_for(config.pixel_format);

        let fmt = device.set_format(&Format::new(width, height, requested))?;
        info!(target: "camera", "Camera format set for {}", fmt);

        if fmt.width != width || fmt.height != height {
            warn!(
                target: "camera",
                "Requested {}x{}, device delivers {}x{}",
                width, height, fmt.width, fmt.height
            );
        }

        let conversion = if fmt.fourcc == requested {
            Conversion::Native
        } else if config.pixel_format == PixelFormat::Grayscale
            && fmt.fourcc == fourcc_for(PixelFormat::Yuv422)
        {
            info!(target: "camera", "GREY not offered, extracting luma from YUYV");
            Conversion::YuyvLuma
        } else {
            return Err(CameraError::Init(format!(
                "device negotiated {} instead of {}",
                fmt.fourcc, requested
            )));
        };

        Ok((fmt, conversion))
    }
}

/// Copies `height` rows of `width` pixels out of a possibly padded device
/// buffer into `dst`, dropping chroma for [`Conversion::YuyvLuma`].
fn pack_rows(
    src: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    bpp: usize,
    conversion: Conversion,
    dst: &mut Vec<u8>,
) -> Result<(), CameraError> {
    let row_bytes = match conversion {
        Conversion::Native => width * bpp,
        Conversion::YuyvLuma => width * 2,
    };
    if height > 0 && src.len() < (height - 1) * stride + row_bytes {
        return Err(CameraError::Capture(format!(
            "short buffer: {} bytes for {} rows of stride {}",
            src.len(),
            height,
            stride
        )));
    }

    dst.clear();
    for row in src.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        match conversion {
            Conversion::Native => dst.extend_from_slice(row),
            Conversion::YuyvLuma => dst.extend(row.iter().step_by(2)),
        }
    }
    Ok(())
}

impl CameraDriver for V4lCamera {
    fn init(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        // a live stream keeps the node busy
        if self.is_initialized() {
            info!(target: "camera", "Reinitializing {}", self.path);
        }
        self.deinit();

        #[cfg(all(
            feature = "sensor-gpio",
            any(target_arch = "arm", target_arch = "aarch64")
        ))]
        super::gpio::prepare_sensor(&config.pins)?;

        debug!(
            target: "camera",
            "xclk {} Hz, ledc timer {} channel {}, SCCB on {}/{} are owned by the kernel driver",
            config.xclk_freq_hz,
            config.ledc_timer,
            config.ledc_channel,
            config.pins.sccb_sda,
            config.pins.sccb_scl
        );

        let device = Device::with_path(&self.path).map_err(|e| {
            error!(target: "camera", "Cannot open {}: {}", self.path, e);
            CameraError::Init(format!("{}: {}", self.path, e))
        })?;

        let (fmt, conversion) = Self::negotiate(&device, config)?;
        Self::apply_orientation(&device, config);

        let device_bpp = match conversion {
            Conversion::YuyvLuma => 2,
            Conversion::Native => config.pixel_format.bytes_per_pixel().unwrap_or(1),
        };
        let stride = if fmt.stride > 0 {
            fmt.stride as usize
        } else {
            fmt.width as usize * device_bpp
        };

        let stream: MmapStream<'static> =
            MmapStream::with_buffers(&device, Type::VideoCapture, config.fb_count)?;

        self.session = Some(Session {
            stream,
            format: config.pixel_format,
            width: fmt.width as usize,
            height: fmt.height as usize,
            stride,
            conversion,
        });
        self.device = Some(device);
        Ok(())
    }

    fn capture(&mut self) -> Result<FrameBuffer<'_>, CameraError> {
        let session = self.session.as_mut().ok_or(CameraError::NotInitialized)?;

        let (buf, meta) = session.stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let sequence = meta.sequence;

        let data: &[u8] = match session.format.bytes_per_pixel() {
            None => &buf[..used],
            Some(bpp) => {
                let packed = session.width * bpp;
                if session.conversion == Conversion::Native && session.stride == packed {
                    &buf[..used]
                } else {
                    pack_rows(
                        &buf[..used],
                        session.width,
                        session.height,
                        session.stride,
                        bpp,
                        session.conversion,
                        &mut self.scratch,
                    )?;
                    &self.scratch
                }
            }
        };

        Ok(FrameBuffer {
            width: session.width,
            height: session.height,
            format: session.format,
            sequence,
            data,
        })
    }

    fn deinit(&mut self) {
        // stream must go before the device it was created from
        self.session = None;
        self.device = None;
        self.scratch.clear();
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        self.deinit();
    }
}
