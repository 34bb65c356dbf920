use crate::config::{Configuration, SelectionStrategy};
use crate::geometry::{self, Point2};
use crate::models::{Candidate, ShapeCategory, TargetReport};

/// Index of the best candidate of `category`.
///
/// Comparisons are strict, so the first candidate seen wins ties.
pub fn select_best(
    candidates: &[Candidate],
    category: ShapeCategory,
    strategy: SelectionStrategy,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.category != Some(category) {
            continue;
        }
        let better = match best.map(|b| &candidates[b]) {
            None => true,
            Some(current) => match strategy {
                SelectionStrategy::Largest => candidate.bbox_area > current.bbox_area,
                SelectionStrategy::ClosestToAimPoint => {
                    candidate.distance_to_aim < current.distance_to_aim
                }
            },
        };
        if better {
            best = Some(i);
        }
    }
    best
}

/// Winner per enabled category, in priority order.
pub fn select_per_category(
    candidates: &[Candidate],
    config: &Configuration,
) -> Vec<(ShapeCategory, Option<usize>)> {
    config
        .enabled_categories()
        .into_iter()
        .map(|category| (category, select_best(candidates, category, config.selection)))
        .collect()
}

/// Offset of a selected candidate from the aim point.
///
/// The centroid is normalized against the frame height regardless of the
/// selection-time y normalization.
pub fn report(
    category: ShapeCategory,
    candidate: Option<&Candidate>,
    width: u32,
    height: u32,
    aim: Point2,
    config: &Configuration,
) -> TargetReport {
    let Some(candidate) = candidate else {
        return TargetReport::not_found(category);
    };
    let normalized = geometry::normalize(candidate.centroid, width as f64, height as f64);
    let offset = normalized.sub(aim);
    TargetReport {
        category,
        found: true,
        offset_x: offset.x,
        offset_y: offset.y,
        angle_x_deg: geometry::normalized_to_degrees(offset.x, config.horizontal_fov_deg),
        angle_y_deg: geometry::normalized_to_degrees(offset.y, config.vertical_fov_deg),
    }
}
