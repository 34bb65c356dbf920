pub mod threshold;
pub mod morphology;
pub mod contours;
pub mod classify;
pub mod select;
pub mod annotate;

use image::GrayImage;

use crate::error::{Result, VisionError};

/// Zeroed single-channel buffer, failing instead of aborting when the
/// allocation cannot be satisfied.
pub(crate) fn try_alloc_gray(width: u32, height: u32) -> Result<GrayImage> {
    let failed = || VisionError::ScratchAllocation { width, height };
    let len = (width as usize).checked_mul(height as usize).ok_or_else(failed)?;
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| failed())?;
    buf.resize(len, 0);
    GrayImage::from_raw(width, height, buf).ok_or_else(failed)
}
