use std::fmt;
use std::str::FromStr;

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point2};

/// Shape class a candidate can be sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeCategory {
    /// Narrow, tall target.
    Tall,
    /// Wide target.
    Wide,
    /// Thin strip, or a bare segment seen at a steep angle.
    Line,
}

impl ShapeCategory {
    /// Order in which aspect-ratio windows are tested.
    pub const PRIORITY: [ShapeCategory; 3] =
        [ShapeCategory::Tall, ShapeCategory::Wide, ShapeCategory::Line];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeCategory::Tall => "tall",
            ShapeCategory::Wide => "wide",
            ShapeCategory::Line => "line",
        }
    }
}

impl fmt::Display for ShapeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tall" => Ok(ShapeCategory::Tall),
            "wide" => Ok(ShapeCategory::Wide),
            "line" => Ok(ShapeCategory::Line),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Closed loop of pixel coordinates in trace order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consecutive vertex pairs, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point<i32>, Point<i32>)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

/// Contour extractor output: the traced boundary and its simplified hull.
#[derive(Debug, Clone)]
pub struct ExtractedContour {
    pub raw: Contour,
    pub hull: Contour,
    pub polygon: Contour,
}

/// A simplified polygon with the metrics used to classify and rank it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub polygon: Contour,
    pub bbox: BoundingBox,
    pub bbox_area: f64,
    pub vertex_count: usize,
    /// Horizontal over vertical edge length. `0.0` means undefined.
    pub aspect_ratio: f64,
    pub category: Option<ShapeCategory>,
    /// Vertex average, in pixels.
    pub centroid: Point2,
    /// Centroid in the aim-point frame, per the configured y normalization.
    pub normalized_centroid: Point2,
    pub distance_to_aim: f64,
}

/// Per-category result of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub category: ShapeCategory,
    pub found: bool,
    /// Normalized offset from the aim point, roughly in `[-1, 1]`.
    pub offset_x: f64,
    pub offset_y: f64,
    /// Offset converted to degrees using half the field of view.
    pub angle_x_deg: f64,
    pub angle_y_deg: f64,
}

impl TargetReport {
    pub fn not_found(category: ShapeCategory) -> Self {
        Self {
            category,
            found: false,
            offset_x: 0.0,
            offset_y: 0.0,
            angle_x_deg: 0.0,
            angle_y_deg: 0.0,
        }
    }
}
