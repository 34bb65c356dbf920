use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close_mut;
use log::warn;

/// Closes gaps in a binary mask in place.
///
/// `iterations` dilations with a 3x3 square followed by as many erosions,
/// which is a single closing with an L∞ radius of `iterations`.
pub fn close_holes(mask: &mut GrayImage, iterations: u32) {
    if iterations == 0 {
        return;
    }
    close_mut(mask, Norm::LInf, closing_radius(iterations));
}

/// Structuring-element radius for an iteration count, capped at 255.
pub fn closing_radius(iterations: u32) -> u8 {
    u8::try_from(iterations).unwrap_or_else(|_| {
        warn!(
            "Hole closing iterations {} exceed {}, capping the radius",
            iterations,
            u8::MAX
        );
        u8::MAX
    })
}
