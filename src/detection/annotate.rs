use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};

use crate::geometry::{self, Point2};
use crate::models::Contour;

fn to_f32(p: imageproc::point::Point<i32>) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Outlines each contour as a closed polyline.
pub fn draw_contours<'a>(
    frame: &mut RgbImage,
    contours: impl IntoIterator<Item = &'a Contour>,
    color: [u8; 3],
) {
    let color = Rgb(color);
    for contour in contours {
        match contour.points.as_slice() {
            [] => {}
            [p] => {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < frame.width() && (p.y as u32) < frame.height() {
                    frame.put_pixel(p.x as u32, p.y as u32, color);
                }
            }
            _ => {
                for (a, b) in contour.edges() {
                    draw_line_segment_mut(frame, to_f32(a), to_f32(b), color);
                }
            }
        }
    }
}

/// Crosshair at the aim point and a line from it to each found centroid.
pub fn draw_offsets(frame: &mut RgbImage, aim: Point2, centroids: &[Point2], color: [u8; 3]) {
    let (width, height) = frame.dimensions();
    let (ax, ay) = geometry::denormalize(aim, width, height);
    let color = Rgb(color);
    draw_cross_mut(frame, color, ax as i32, ay as i32);
    for c in centroids {
        draw_line_segment_mut(frame, (ax, ay), (c.x as f32, c.y as f32), color);
    }
}
