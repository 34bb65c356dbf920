use image::{GrayImage, RgbImage};

use crate::config::{ChannelRange, ColorSpace};
use crate::error::Result;
use super::try_alloc_gray;

/// Per-channel scratch planes used by the ranged threshold.
///
/// `low[c]` first receives the raw channel and is then overwritten with the
/// "≤ high" test; `high[c]` receives the "> low - 1" test.
pub struct ChannelBuffers {
    pub low: [GrayImage; 3],
    pub high: [GrayImage; 3],
}

impl ChannelBuffers {
    pub fn allocate(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            low: [
                try_alloc_gray(width, height)?,
                try_alloc_gray(width, height)?,
                try_alloc_gray(width, height)?,
            ],
            high: [
                try_alloc_gray(width, height)?,
                try_alloc_gray(width, height)?,
                try_alloc_gray(width, height)?,
            ],
        })
    }
}

/// OpenCV-style 8-bit HSV: hue in `0..180`, saturation and value in `0..=255`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v == 0.0 { 0.0 } else { 255.0 * diff / v };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h8 = ((h / 2.0).round() as u32 % 180) as u8;
    [h8, s.round() as u8, v as u8]
}

/// Copies each channel (converted to `color_space`) into its own plane.
pub fn split_channels(frame: &RgbImage, color_space: ColorSpace, planes: &mut [GrayImage; 3]) {
    let [p0, p1, p2] = planes;
    let dst = p0.iter_mut().zip(p1.iter_mut()).zip(p2.iter_mut());
    for (pixel, ((c0, c1), c2)) in frame.pixels().zip(dst) {
        let channels = match color_space {
            ColorSpace::Rgb => pixel.0,
            ColorSpace::Hsv => rgb_to_hsv(pixel.0),
        };
        *c0 = channels[0];
        *c1 = channels[1];
        *c2 = channels[2];
    }
}

/// Ranged threshold into `mask`: 255 where every channel is inside its
/// inclusive range, 0 elsewhere.
///
/// Each range is evaluated as two one-sided tests that are ANDed together.
pub fn threshold_into(
    frame: &RgbImage,
    color_space: ColorSpace,
    ranges: &[ChannelRange; 3],
    buffers: &mut ChannelBuffers,
    mask: &mut GrayImage,
) {
    split_channels(frame, color_space, &mut buffers.low);

    for (c, range) in ranges.iter().enumerate() {
        let lower = i32::from(range.low) - 1;
        let low_plane = &mut buffers.low[c];
        let high_plane = &mut buffers.high[c];
        for (src, above) in low_plane.iter_mut().zip(high_plane.iter_mut()) {
            *above = if i32::from(*src) > lower { 255 } else { 0 };
            *src = if *src <= range.high { 255 } else { 0 };
        }
    }

    mask.fill(255);
    for plane in buffers.low.iter().chain(buffers.high.iter()) {
        for (m, p) in mask.iter_mut().zip(plane.as_raw()) {
            *m &= *p;
        }
    }
}

/// Allocating convenience wrapper around [`threshold_into`].
pub fn threshold(
    frame: &RgbImage,
    color_space: ColorSpace,
    ranges: &[ChannelRange; 3],
) -> Result<GrayImage> {
    let (width, height) = frame.dimensions();
    let mut buffers = ChannelBuffers::allocate(width, height)?;
    let mut mask = try_alloc_gray(width, height)?;
    threshold_into(frame, color_space, ranges, &mut buffers, &mut mask);
    Ok(mask)
}
