//! Shape typing of simplified contours.
//!
//! Quadrilaterals are typed by the ratio of their horizontal to vertical edge
//! lengths; two-vertex polygons (a blob seen edge-on) are typed as lines when
//! steep and tall enough. Everything else stays unclassified.

use imageproc::point::Point;
use log::debug;

use crate::config::{Configuration, EdgeClassifier, YNormalization};
use crate::geometry::{self, Point2};
use crate::models::{Candidate, Contour, ShapeCategory};

/// Edge length in the ratio: either the full hypotenuse or its projection
/// on the edge's own axis.
fn averaged_extent(edges: &[(Point<i32>, Point<i32>)], horizontal: bool, mixed_override: bool) -> f64 {
    let mixed = mixed_override
        && geometry::slope_sign(edges[0].0, edges[0].1) * geometry::slope_sign(edges[1].0, edges[1].1) < 0;
    let total: f64 = edges
        .iter()
        .map(|&(a, b)| {
            if mixed {
                let (dx, dy) = geometry::delta(a, b);
                if horizontal { dx.abs() } else { dy.abs() }
            } else {
                geometry::edge_length(a, b)
            }
        })
        .sum();
    total / edges.len() as f64
}

/// Horizontal over vertical edge length for a quadrilateral.
///
/// Returns `0.0` when the edges do not split into exactly two horizontal and
/// two vertical ones, or when the vertical extent is zero.
pub fn aspect_ratio(
    polygon: &Contour,
    classifier: EdgeClassifier,
    near_horizontal_slope: f64,
    near_vertical_slope: f64,
) -> f64 {
    let mut horizontal = Vec::with_capacity(4);
    let mut vertical = Vec::with_capacity(4);

    for (a, b) in polygon.edges() {
        let Some(slope) = geometry::slope(a, b) else {
            continue;
        };
        match classifier {
            EdgeClassifier::Magnitude => {
                let (dx, dy) = geometry::delta(a, b);
                if dx.abs() > dy.abs() {
                    horizontal.push((a, b));
                } else {
                    vertical.push((a, b));
                }
            }
            EdgeClassifier::Slope => {
                let m = slope.abs();
                if m < near_horizontal_slope {
                    horizontal.push((a, b));
                } else if m > near_vertical_slope {
                    vertical.push((a, b));
                }
            }
        }
    }

    if horizontal.len() != 2 || vertical.len() != 2 {
        return 0.0;
    }

    let mixed_override = classifier == EdgeClassifier::Magnitude;
    let width = averaged_extent(&horizontal, true, mixed_override);
    let height = averaged_extent(&vertical, false, mixed_override);
    if height == 0.0 {
        return 0.0;
    }
    width / height
}

/// A two-vertex polygon counts as a line when steeper than the near-vertical
/// slope and taller than `min_line_height_ratio` of the frame.
pub fn is_line_segment(a: Point<i32>, b: Point<i32>, frame_height: u32, config: &Configuration) -> bool {
    let Some(slope) = geometry::slope(a, b) else {
        return false;
    };
    let (_, dy) = geometry::delta(a, b);
    slope.abs() > config.near_vertical_slope()
        && dy.abs() > config.min_line_height_ratio * frame_height as f64
}

/// First category in priority order whose window contains `aspect_ratio`.
pub fn categorize(aspect_ratio: f64, config: &Configuration) -> Option<ShapeCategory> {
    ShapeCategory::PRIORITY
        .into_iter()
        .find(|c| config.category(*c).accepts(aspect_ratio))
}

/// Builds a candidate from a simplified polygon, or `None` when it is
/// filtered out or cannot be typed.
pub fn classify(
    polygon: &Contour,
    width: u32,
    height: u32,
    config: &Configuration,
    aim: Point2,
) -> Option<Candidate> {
    let bbox = geometry::bounding_box(&polygon.points)?;
    let centroid = geometry::centroid(&polygon.points)?;
    let bbox_area = bbox.area();
    let vertex_count = polygon.len();

    let (aspect_ratio, category) = match vertex_count {
        2 => {
            let line = config.line.enabled
                && is_line_segment(polygon.points[0], polygon.points[1], height, config);
            if !line {
                return None;
            }
            (0.0, Some(ShapeCategory::Line))
        }
        _ => {
            let min_area = width as f64 * height as f64 * config.min_area_ratio;
            if bbox_area <= min_area {
                return None;
            }
            if vertex_count != 4 {
                return None;
            }
            let ratio = aspect_ratio(
                polygon,
                config.edge_classifier,
                config.near_horizontal_slope(),
                config.near_vertical_slope(),
            );
            (ratio, categorize(ratio, config))
        }
    };
    category?;

    let y_extent = match config.y_normalization {
        YNormalization::Height => height,
        YNormalization::Width => width,
    };
    let normalized_centroid = geometry::normalize(centroid, width as f64, y_extent as f64);

    Some(Candidate {
        polygon: polygon.clone(),
        bbox,
        bbox_area,
        vertex_count,
        aspect_ratio,
        category,
        centroid,
        normalized_centroid,
        distance_to_aim: normalized_centroid.distance_to(aim),
    })
}

/// Classifies every polygon, keeping discovery order.
pub fn classify_all<'a>(
    polygons: impl IntoIterator<Item = &'a Contour>,
    width: u32,
    height: u32,
    config: &Configuration,
    aim: Point2,
) -> Vec<Candidate> {
    let mut total = 0;
    let candidates: Vec<Candidate> = polygons
        .into_iter()
        .inspect(|_| total += 1)
        .filter_map(|p| classify(p, width, height, config, aim))
        .collect();
    debug!("Classified {} of {} polygons", candidates.len(), total);
    candidates
}
