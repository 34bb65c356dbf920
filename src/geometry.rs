//! Point and vector math shared by every stage.
//!
//! Pixel coordinates are integer [`Point`]s with row 0 at the top. Normalized
//! coordinates are [`Point2`]s in roughly `[-1, 1]` with `+y` pointing up.

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates (inclusive extent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

/// Floating-point 2D point, used for centroids and normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn sub(&self, other: Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }
}

/// Edge delta `(dx, dy)` from `a` to `b`.
pub fn delta(a: Point<i32>, b: Point<i32>) -> (f64, f64) {
    ((b.x - a.x) as f64, (b.y - a.y) as f64)
}

pub fn edge_length(a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = delta(a, b);
    dx.hypot(dy)
}

/// Slope `dy / dx` of the edge `a -> b`.
///
/// Vertical edges give `±inf`; a zero-length edge gives `None`.
pub fn slope(a: Point<i32>, b: Point<i32>) -> Option<f64> {
    let (dx, dy) = delta(a, b);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(dy / dx)
}

/// Sign of the edge slope, independent of traversal direction.
///
/// Returns `0` for perfectly horizontal or vertical edges.
pub fn slope_sign(a: Point<i32>, b: Point<i32>) -> i8 {
    let (dx, dy) = delta(a, b);
    let s = dx.signum() * dy.signum();
    if dx == 0.0 || dy == 0.0 {
        0
    } else if s > 0.0 {
        1
    } else {
        -1
    }
}

/// Slope magnitude corresponding to an angle above the horizontal.
pub fn slope_threshold(angle_deg: f64) -> f64 {
    angle_deg.to_radians().tan().abs()
}

/// Average of the polygon vertices.
pub fn centroid(points: &[Point<i32>]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    Some(Point2::new(sx / n, sy / n))
}

pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Shoelace area of a closed polygon.
///
/// Positive means clockwise on screen (image rows grow downwards).
pub fn signed_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    sum / 2.0
}

/// Maps a pixel position into `[-1, 1]` on both axes, `+y` up.
///
/// `y_extent` is normally the frame height.
pub fn normalize(p: Point2, x_extent: f64, y_extent: f64) -> Point2 {
    if x_extent <= 0.0 || y_extent <= 0.0 {
        return Point2::ORIGIN;
    }
    Point2::new(p.x / x_extent * 2.0 - 1.0, -(p.y / y_extent * 2.0 - 1.0))
}

/// Inverse of [`normalize`] with the frame height as the vertical extent.
pub fn denormalize(p: Point2, width: u32, height: u32) -> (f32, f32) {
    (
        ((p.x + 1.0) / 2.0 * width as f64) as f32,
        ((1.0 - p.y) / 2.0 * height as f64) as f32,
    )
}

/// Angle in degrees to a normalized offset, given the full field of view.
pub fn degrees_to_normalized(angle_deg: f64, fov_deg: f64) -> f64 {
    let half = fov_deg / 2.0;
    if half == 0.0 { 0.0 } else { angle_deg / half }
}

/// Normalized offset to an angle in degrees, given the full field of view.
pub fn normalized_to_degrees(offset: f64, fov_deg: f64) -> f64 {
    offset * fov_deg / 2.0
}

fn perpendicular_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = delta(a, b);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return edge_length(a, p);
    }
    ((p.x - a.x) as f64 * dy - (p.y - a.y) as f64 * dx).abs() / len
}

/// Open-chain Douglas-Peucker; both endpoints are kept.
fn simplify_open(chain: &[Point<i32>], epsilon: f64, out: &mut Vec<Point<i32>>) {
    let last = chain.len() - 1;
    let (a, b) = (chain[0], chain[last]);
    let mut max_d = 0.0;
    let mut index = 0;
    for (i, p) in chain.iter().enumerate().take(last).skip(1) {
        let d = perpendicular_distance(*p, a, b);
        if d > max_d {
            max_d = d;
            index = i;
        }
    }
    if max_d > epsilon {
        simplify_open(&chain[..=index], epsilon, out);
        out.pop();
        simplify_open(&chain[index..], epsilon, out);
    } else {
        out.push(a);
        out.push(b);
    }
}

/// Douglas-Peucker simplification of a closed polygon.
///
/// The loop is split at the vertex farthest from the first one and each half
/// is simplified as an open chain. Vertex order is preserved.
pub fn simplify_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let start = points[0];
    let (far, far_d) = points
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, p)| (i, edge_length(start, *p)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if far_d == 0.0 {
        return vec![start];
    }

    let mut first_half = Vec::new();
    simplify_open(&points[..=far], epsilon, &mut first_half);

    let mut second_chain: Vec<Point<i32>> = points[far..].to_vec();
    second_chain.push(start);
    let mut second_half = Vec::new();
    simplify_open(&second_chain, epsilon, &mut second_half);

    // Both halves share the split vertices.
    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half
}

/// Drops vertices lying on the segment between their neighbours, and
/// consecutive duplicates.
pub fn remove_collinear(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for p in points {
        if pts.last() != Some(p) {
            pts.push(*p);
        }
    }
    while pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    if pts.len() < 3 {
        return pts;
    }

    let mut changed = true;
    while changed && pts.len() >= 3 {
        changed = false;
        let n = pts.len();
        for i in 0..n {
            let prev = pts[(i + n - 1) % n];
            let cur = pts[i];
            let next = pts[(i + 1) % n];
            let (ax, ay) = delta(prev, cur);
            let (bx, by) = delta(cur, next);
            if ax * by - ay * bx == 0.0 {
                pts.remove(i);
                changed = true;
                break;
            }
        }
    }
    pts
}

/// Keeps only the points where the trace changes direction.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let mut out = Vec::new();
    for i in 0..n {
        let prev = points[(i + n - 1) % n];
        let cur = points[i];
        let next = points[(i + 1) % n];
        let step_in = ((cur.x - prev.x).signum(), (cur.y - prev.y).signum());
        let step_out = ((next.x - cur.x).signum(), (next.y - cur.y).signum());
        if step_in != step_out {
            out.push(cur);
        }
    }
    if out.is_empty() {
        out.push(points[0]);
    }
    out
}
