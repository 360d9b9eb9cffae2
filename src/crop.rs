//! Center crop from a sensor frame into a model input buffer

use thiserror::Error;

use crate::camera::FrameBuffer;
use crate::config::PixelFormat;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CropError {
    #[error("crop size must be non-zero, got {width}x{height}")]
    EmptyCrop { width: usize, height: usize },

    #[error("{width}x{height} crop does not fit in a {frame_width}x{frame_height} frame")]
    FrameTooSmall {
        width: usize,
        height: usize,
        frame_width: usize,
        frame_height: usize,
    },

    #[error("output buffer holds {actual} bytes, crop needs {needed}")]
    OutputTooSmall { needed: usize, actual: usize },

    #[error("frame carries {actual} bytes, geometry implies {expected}")]
    FrameTruncated { expected: usize, actual: usize },

    #[error("cannot crop {0:?} frames")]
    UnsupportedFormat(PixelFormat),

    #[error("unsupported channel count {0}, expected 1 or 3")]
    UnsupportedChannels(usize),

    #[error("YUYV frames need an even width, got {0}")]
    OddYuyvWidth(usize),
}

/// Region of the frame copied into the output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Window of `width`x`height` centered in the frame.
///
/// Each half is rounded down on its own, so `x = frame_width / 2 - width / 2`.
pub fn center_window(
    frame_width: usize,
    frame_height: usize,
    width: usize,
    height: usize,
) -> Result<CropWindow, CropError> {
    if width == 0 || height == 0 {
        return Err(CropError::EmptyCrop { width, height });
    }
    if width > frame_width || height > frame_height {
        return Err(CropError::FrameTooSmall {
            width,
            height,
            frame_width,
            frame_height,
        });
    }

    Ok(CropWindow {
        x: frame_width / 2 - width / 2,
        y: frame_height / 2 - height / 2,
        width,
        height,
    })
}

/// Copies the centered `width`x`height` region of `frame` into `out`.
///
/// Output is row-major with `channels` interleaved bytes per pixel: one luma
/// byte, or three RGB bytes. Bytes past `width * height * channels` are left
/// untouched.
pub fn crop_center(
    frame: &FrameBuffer<'_>,
    width: usize,
    height: usize,
    channels: usize,
    out: &mut [u8],
) -> Result<CropWindow, CropError> {
    if channels != 1 && channels != 3 {
        return Err(CropError::UnsupportedChannels(channels));
    }
    let bpp = frame
        .format
        .bytes_per_pixel()
        .ok_or(CropError::UnsupportedFormat(frame.format))?;

    // chroma is shared per pixel pair
    if frame.format == PixelFormat::Yuv422 && frame.width % 2 != 0 {
        return Err(CropError::OddYuyvWidth(frame.width));
    }

    let window = center_window(frame.width, frame.height, width, height)?;

    let needed = width * height * channels;
    if out.len() < needed {
        return Err(CropError::OutputTooSmall {
            needed,
            actual: out.len(),
        });
    }

    let stride = frame.width * bpp;
    let expected = stride * frame.height;
    if frame.data.len() < expected {
        return Err(CropError::FrameTruncated {
            expected,
            actual: frame.data.len(),
        });
    }

    for (i, dst_row) in out[..needed].chunks_exact_mut(width * channels).enumerate() {
        let row_start = (window.y + i) * stride;
        let src_row = &frame.data[row_start..row_start + stride];

        match (frame.format, channels) {
            (PixelFormat::Grayscale, 1) => {
                dst_row.copy_from_slice(&src_row[window.x..window.x + width]);
            }
            (PixelFormat::Grayscale, _) => {
                for (j, px) in dst_row.chunks_exact_mut(3).enumerate() {
                    px.fill(src_row[window.x + j]);
                }
            }
            (PixelFormat::Yuv422, _) => {
                for (j, px) in dst_row.chunks_exact_mut(channels).enumerate() {
                    write_yuyv(src_row, window.x + j, px);
                }
            }
            (PixelFormat::Rgb565, _) => {
                for (j, px) in dst_row.chunks_exact_mut(channels).enumerate() {
                    let at = (window.x + j) * 2;
                    write_rgb565([src_row[at], src_row[at + 1]], px);
                }
            }
            (PixelFormat::Jpeg, _) => return Err(CropError::UnsupportedFormat(frame.format)),
        }
    }

    Ok(window)
}

// YUYV: Y0 U Y1 V, chroma shared by each pixel pair
fn write_yuyv(row: &[u8], x: usize, px: &mut [u8]) {
    let y = row[x * 2];
    if px.len() == 1 {
        px[0] = y;
        return;
    }

    let pair = (x & !1) * 2;
    let d = row[pair + 1] as i32 - 128;
    let e = row[pair + 3] as i32 - 128;
    let y = y as i32;

    // full-range BT.601
    px[0] = clamp_u8(y + ((359 * e) >> 8));
    px[1] = clamp_u8(y - ((88 * d + 183 * e) >> 8));
    px[2] = clamp_u8(y + ((454 * d) >> 8));
}

fn write_rgb565(bytes: [u8; 2], px: &mut [u8]) {
    let value = u16::from_be_bytes(bytes);
    let r5 = (value >> 11) as u8;
    let g6 = ((value >> 5) & 0x3F) as u8;
    let b5 = (value & 0x1F) as u8;

    let r = (r5 << 3) | (r5 >> 2);
    let g = (g6 << 2) | (g6 >> 4);
    let b = (b5 << 3) | (b5 >> 2);

    if px.len() == 1 {
        px[0] = ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8;
    } else {
        px.copy_from_slice(&[r, g, b]);
    }
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: usize, height: usize, data: &[u8]) -> FrameBuffer<'_> {
        FrameBuffer {
            width,
            height,
            format: PixelFormat::Grayscale,
            sequence: 0,
            data,
        }
    }

    #[test]
    fn test_center_window_offsets() {
        let window = center_window(160, 120, 96, 96).unwrap();
        assert_eq!(window, CropWindow { x: 32, y: 12, width: 96, height: 96 });

        // halves round down separately
        let window = center_window(5, 5, 2, 2).unwrap();
        assert_eq!((window.x, window.y), (1, 1));

        let window = center_window(4, 4, 4, 4).unwrap();
        assert_eq!((window.x, window.y), (0, 0));
    }

    #[test]
    fn test_center_window_bounds() {
        assert_eq!(
            center_window(160, 120, 0, 10),
            Err(CropError::EmptyCrop { width: 0, height: 10 })
        );
        assert!(matches!(
            center_window(160, 120, 96, 121),
            Err(CropError::FrameTooSmall { .. })
        ));
    }

    #[test]
    fn test_grayscale_crop_matches_index_identity() {
        let (fw, fh) = (10, 8);
        let data: Vec<u8> = (0..fw * fh).map(|i| i as u8).collect();
        let frame = gray_frame(fw, fh, &data);

        let (w, h) = (4, 3);
        let mut out = vec![0u8; w * h];
        let window = crop_center(&frame, w, h, 1, &mut out).unwrap();

        let (ox, oy) = (fw / 2 - w / 2, fh / 2 - h / 2);
        assert_eq!((window.x, window.y), (ox, oy));
        for i in 0..h {
            for j in 0..w {
                assert_eq!(out[i * w + j], data[(i + oy) * fw + j + ox]);
            }
        }
    }

    #[test]
    fn test_grayscale_to_three_channels() {
        let data = [0, 1, 2, 3, 4, 5, 6, 7, 8];
        let frame = gray_frame(3, 3, &data);
        let mut out = [0u8; 3];
        crop_center(&frame, 1, 1, 3, &mut out).unwrap();
        assert_eq!(out, [4, 4, 4]);
    }

    #[test]
    fn test_output_buffer_checks() {
        let data = [0u8; 16];
        let frame = gray_frame(4, 4, &data);

        let mut small = [0u8; 3];
        assert_eq!(
            crop_center(&frame, 2, 2, 1, &mut small),
            Err(CropError::OutputTooSmall { needed: 4, actual: 3 })
        );

        // trailing bytes are not written
        let mut large = [0xAAu8; 6];
        crop_center(&frame, 2, 2, 1, &mut large).unwrap();
        assert_eq!(large, [0, 0, 0, 0, 0xAA, 0xAA]);
    }

    #[test]
    fn test_truncated_frame() {
        let data = [0u8; 10];
        let frame = gray_frame(4, 4, &data);
        let mut out = [0u8; 4];
        assert_eq!(
            crop_center(&frame, 2, 2, 1, &mut out),
            Err(CropError::FrameTruncated { expected: 16, actual: 10 })
        );
    }

    #[test]
    fn test_format_and_channel_rejections() {
        let data = [0u8; 16];
        let mut frame = gray_frame(4, 4, &data);
        let mut out = [0u8; 16];

        assert_eq!(
            crop_center(&frame, 2, 2, 2, &mut out),
            Err(CropError::UnsupportedChannels(2))
        );

        frame.format = PixelFormat::Jpeg;
        assert_eq!(
            crop_center(&frame, 2, 2, 1, &mut out),
            Err(CropError::UnsupportedFormat(PixelFormat::Jpeg))
        );
    }

    #[test]
    fn test_yuyv_odd_width_rejected() {
        // 3x1 YUYV, last pixel has no V sample
        let data = [10, 128, 20, 128, 30, 128];
        let frame = FrameBuffer {
            width: 3,
            height: 1,
            format: PixelFormat::Yuv422,
            sequence: 0,
            data: &data,
        };

        let mut rgb = [0u8; 9];
        assert_eq!(
            crop_center(&frame, 3, 1, 3, &mut rgb),
            Err(CropError::OddYuyvWidth(3))
        );
        let mut luma = [0u8; 3];
        assert_eq!(
            crop_center(&frame, 3, 1, 1, &mut luma),
            Err(CropError::OddYuyvWidth(3))
        );
    }

    #[test]
    fn test_yuyv_luma_and_rgb() {
        // 4x1 YUYV, second pair carries strong red chroma
        let data = [10, 128, 20, 128, 100, 128, 110, 228];
        let frame = FrameBuffer {
            width: 4,
            height: 1,
            format: PixelFormat::Yuv422,
            sequence: 0,
            data: &data,
        };

        let mut luma = [0u8; 2];
        crop_center(&frame, 2, 1, 1, &mut luma).unwrap();
        assert_eq!(luma, [20, 100]);

        let mut rgb = [0u8; 6];
        crop_center(&frame, 2, 1, 3, &mut rgb).unwrap();
        // neutral chroma keeps the pixel gray
        assert_eq!(&rgb[..3], &[20, 20, 20]);
        // V = 228 pushes red up and green down
        assert!(rgb[3] > 100 && rgb[4] < 100);
        assert_eq!(rgb[5], 100);
    }

    #[test]
    fn test_rgb565_expansion() {
        // white, red
        let data = [0xFF, 0xFF, 0xF8, 0x00];
        let frame = FrameBuffer {
            width: 2,
            height: 1,
            format: PixelFormat::Rgb565,
            sequence: 0,
            data: &data,
        };

        let mut rgb = [0u8; 6];
        crop_center(&frame, 2, 1, 3, &mut rgb).unwrap();
        assert_eq!(rgb, [255, 255, 255, 255, 0, 0]);

        let mut luma = [0u8; 2];
        crop_center(&frame, 2, 1, 1, &mut luma).unwrap();
        assert_eq!(luma, [255, 76]);
    }
}
