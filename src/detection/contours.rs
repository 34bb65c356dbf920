use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::convex_hull;

use crate::geometry;
use crate::models::{Contour, ExtractedContour};

/// Outer boundaries of top-level blobs, in trace order.
///
/// Holes and blobs nested inside holes are skipped. Straight runs are
/// compressed to their end points.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::new(geometry::compress_chain(&c.points)))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Convex hull with clockwise on-screen winding and no collinear vertices.
pub fn hull(contour: &Contour) -> Contour {
    let points = if contour.len() < 3 {
        contour.points.clone()
    } else {
        convex_hull(contour.points.as_slice())
    };
    let mut points = geometry::remove_collinear(&points);
    if geometry::signed_area(&points) < 0.0 {
        points.reverse();
    }
    Contour::new(points)
}

/// Douglas-Peucker simplification of a hull within `epsilon` pixels.
pub fn simplify(hull: &Contour, epsilon: f64) -> Contour {
    Contour::new(geometry::simplify_closed(&hull.points, epsilon))
}

/// Runs tracing, hulling and simplification over a mask.
///
/// An empty mask yields an empty list.
pub fn extract(mask: &GrayImage, epsilon: f64) -> Vec<ExtractedContour> {
    find_external_contours(mask)
        .into_iter()
        .map(|raw| {
            let hull = hull(&raw);
            let polygon = simplify(&hull, epsilon);
            ExtractedContour { raw, hull, polygon }
        })
        .collect()
}
