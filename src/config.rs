//! Per-frame configuration and its property-store adapter.
//!
//! A [`Configuration`] is read once per frame. Hosts that expose individual
//! properties (sliders, dashboards, key/value stores) update it one field at a
//! time through [`Configuration::set_property`] or a [`ConfigPatch`].

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};
use crate::geometry::{self, Point2};
use crate::models::ShapeCategory;

/// Inclusive `[low, high]` range for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub low: u8,
    pub high: u8,
}

impl ChannelRange {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// `value > low - 1 && value <= high`, computed without underflow.
    ///
    /// An inverted range (`low > high`) selects nothing.
    pub fn contains(&self, value: u8) -> bool {
        i32::from(value) > i32::from(self.low) - 1 && value <= self.high
    }
}

/// How the three channel ranges are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    /// Ranges apply to red, green and blue directly.
    #[default]
    Rgb,
    /// Ranges apply to hue (0..180), saturation and value (0..255).
    ///
    /// Hue ranges do not wrap: `low > high` selects nothing.
    Hsv,
}

/// How far through the pipeline a frame is processed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[value(alias = "nothing")]
    None,
    Threshold,
    CloseHoles,
    Contours,
    ConvexHull,
    Select,
    Calculate,
    #[default]
    #[value(alias = "everything")]
    Full,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::None,
        Stage::Threshold,
        Stage::CloseHoles,
        Stage::Contours,
        Stage::ConvexHull,
        Stage::Select,
        Stage::Calculate,
        Stage::Full,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::None => "none",
            Stage::Threshold => "threshold",
            Stage::CloseHoles => "close-holes",
            Stage::Contours => "contours",
            Stage::ConvexHull => "convex-hull",
            Stage::Select => "select",
            Stage::Calculate => "calculate",
            Stage::Full => "full",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "nothing" => Ok(Stage::None),
            "threshold" => Ok(Stage::Threshold),
            "close-holes" | "close_holes" => Ok(Stage::CloseHoles),
            "contours" => Ok(Stage::Contours),
            "convex-hull" | "convex_hull" => Ok(Stage::ConvexHull),
            "select" => Ok(Stage::Select),
            "calculate" => Ok(Stage::Calculate),
            "full" | "everything" => Ok(Stage::Full),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

/// Winner policy among candidates of the same category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Greatest bounding-box area.
    #[default]
    Largest,
    /// Smallest distance between normalized centroid and aim point.
    ClosestToAimPoint,
}

impl FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "largest" => Ok(SelectionStrategy::Largest),
            "closest-to-aim-point" | "closest" => Ok(SelectionStrategy::ClosestToAimPoint),
            other => Err(format!("unknown selection strategy '{}'", other)),
        }
    }
}

/// Rule used to label the edges of a quadrilateral as horizontal or vertical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeClassifier {
    /// Horizontal when `|dx| > |dy|`, vertical otherwise. Mixed slope signs
    /// fall back to averaging the projected extents.
    #[default]
    Magnitude,
    /// Horizontal below the near-horizontal slope, vertical above the
    /// near-vertical slope, unlabelled in between.
    Slope,
}

impl FromStr for EdgeClassifier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "magnitude" => Ok(EdgeClassifier::Magnitude),
            "slope" => Ok(EdgeClassifier::Slope),
            other => Err(format!("unknown edge classifier '{}'", other)),
        }
    }
}

/// Vertical extent used when normalizing a centroid for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YNormalization {
    #[default]
    Height,
    /// Divides the row by the frame width. Kept for parity with older
    /// tuning data; it skews `closest-to-aim-point` on non-square frames.
    Width,
}

impl FromStr for YNormalization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "height" => Ok(YNormalization::Height),
            "width" => Ok(YNormalization::Width),
            other => Err(format!("unknown y normalization '{}'", other)),
        }
    }
}

/// Aspect-ratio window for one shape category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryBounds {
    pub enabled: bool,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl CategoryBounds {
    pub const fn new(min_aspect: f64, max_aspect: f64) -> Self {
        Self {
            enabled: true,
            min_aspect,
            max_aspect,
        }
    }

    /// A ratio of exactly zero never matches: it marks an undefined ratio.
    pub fn accepts(&self, aspect_ratio: f64) -> bool {
        self.enabled
            && aspect_ratio != 0.0
            && aspect_ratio >= self.min_aspect
            && aspect_ratio <= self.max_aspect
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub color_space: ColorSpace,
    /// Channel ranges in `color_space` order (r, g, b or h, s, v).
    pub ranges: [ChannelRange; 3],
    pub hole_closing_iterations: u32,
    /// Douglas-Peucker tolerance in pixels.
    pub polygon_epsilon: f64,
    /// Minimum bounding-box area as a fraction of the frame area.
    pub min_area_ratio: f64,
    /// Minimum vertical extent of a line segment as a fraction of frame height.
    pub min_line_height_ratio: f64,
    pub tall: CategoryBounds,
    pub wide: CategoryBounds,
    pub line: CategoryBounds,
    pub edge_classifier: EdgeClassifier,
    pub near_horizontal_deg: f64,
    pub near_vertical_deg: f64,
    pub selection: SelectionStrategy,
    pub y_normalization: YNormalization,
    pub horizontal_fov_deg: f64,
    pub vertical_fov_deg: f64,
    pub active_zone: String,
    pub zone_names: Vec<String>,
    pub zone_desired_x_deg: Vec<f64>,
    pub zone_desired_y_deg: Vec<f64>,
    pub contour_color: [u8; 3],
    pub line_color: [u8; 3],
    pub stage: Stage,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Rgb,
            ranges: [
                ChannelRange::new(0, 100),
                ChannelRange::new(120, 255),
                ChannelRange::new(80, 200),
            ],
            hole_closing_iterations: 5,
            polygon_epsilon: 20.0,
            min_area_ratio: 0.5 / 100.0,
            min_line_height_ratio: 0.1,
            tall: CategoryBounds::new(0.3, 0.9),
            wide: CategoryBounds::new(1.5, 4.5),
            line: CategoryBounds::new(0.02, 0.3),
            edge_classifier: EdgeClassifier::Magnitude,
            near_horizontal_deg: 20.0,
            near_vertical_deg: 70.0,
            selection: SelectionStrategy::Largest,
            y_normalization: YNormalization::Height,
            horizontal_fov_deg: 47.0,
            vertical_fov_deg: 36.0,
            active_zone: "center".to_string(),
            zone_names: vec!["center".to_string()],
            zone_desired_x_deg: vec![0.0],
            zone_desired_y_deg: vec![0.0],
            contour_color: [255, 0, 0],
            line_color: [255, 175, 175],
            stage: Stage::Full,
        }
    }
}

impl Configuration {
    pub fn near_horizontal_slope(&self) -> f64 {
        geometry::slope_threshold(self.near_horizontal_deg)
    }

    pub fn near_vertical_slope(&self) -> f64 {
        geometry::slope_threshold(self.near_vertical_deg)
    }

    pub fn category(&self, category: ShapeCategory) -> &CategoryBounds {
        match category {
            ShapeCategory::Tall => &self.tall,
            ShapeCategory::Wide => &self.wide,
            ShapeCategory::Line => &self.line,
        }
    }

    /// Categories that produce a report, in classification priority order.
    pub fn enabled_categories(&self) -> Vec<ShapeCategory> {
        ShapeCategory::PRIORITY
            .into_iter()
            .filter(|c| self.category(*c).enabled)
            .collect()
    }

    /// Desired aim point of the active zone, normalized by half the field of view.
    ///
    /// Falls back to the frame center when the zone cannot be resolved.
    pub fn aim_point(&self) -> Point2 {
        if self.zone_names.is_empty() {
            return Point2::ORIGIN;
        }
        let Some(index) = self.zone_names.iter().position(|z| z == &self.active_zone) else {
            warn!("Unknown zone '{}', aiming at frame center", self.active_zone);
            return Point2::ORIGIN;
        };
        match (self.zone_desired_x_deg.get(index), self.zone_desired_y_deg.get(index)) {
            (Some(x), Some(y)) => Point2::new(
                geometry::degrees_to_normalized(*x, self.horizontal_fov_deg),
                geometry::degrees_to_normalized(*y, self.vertical_fov_deg),
            ),
            _ => {
                warn!(
                    "Zone '{}' has no desired angles (index {}), aiming at frame center",
                    self.active_zone, index
                );
                Point2::ORIGIN
            }
        }
    }

    /// Applies one property update by name. On error the configuration is unchanged.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.trim();
        let value = value.trim();
        let invalid = |reason: String| VisionError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };

        if let Some((channel, bound)) = channel_key(key) {
            let v: u8 = value.parse().map_err(|e| invalid(format!("{}", e)))?;
            let range = &mut self.ranges[channel];
            match bound {
                Bound::Low => range.low = v,
                Bound::High => range.high = v,
            }
            return Ok(());
        }

        if let Some((category, field)) = key.split_once('.') {
            if let Ok(category) = category.parse::<ShapeCategory>() {
                let bounds = match category {
                    ShapeCategory::Tall => &mut self.tall,
                    ShapeCategory::Wide => &mut self.wide,
                    ShapeCategory::Line => &mut self.line,
                };
                match field {
                    "enabled" => bounds.enabled = parse_bool(value).map_err(invalid)?,
                    "min_aspect" => bounds.min_aspect = parse_f64(value).map_err(invalid)?,
                    "max_aspect" => bounds.max_aspect = parse_f64(value).map_err(invalid)?,
                    _ => return Err(VisionError::UnknownProperty(key.to_string())),
                }
                return Ok(());
            }
        }

        match key {
            "color_space" => {
                self.color_space = match value.to_ascii_lowercase().as_str() {
                    "rgb" => ColorSpace::Rgb,
                    "hsv" => ColorSpace::Hsv,
                    other => return Err(invalid(format!("unknown color space '{}'", other))),
                }
            }
            "hole_closing_iterations" => {
                self.hole_closing_iterations = value.parse::<u32>().map_err(|e| invalid(format!("{}", e)))?
            }
            "polygon_epsilon" => self.polygon_epsilon = parse_f64(value).map_err(invalid)?,
            "min_area_ratio" => self.min_area_ratio = parse_f64(value).map_err(invalid)?,
            "min_line_height_ratio" => {
                self.min_line_height_ratio = parse_f64(value).map_err(invalid)?
            }
            "edge_classifier" => self.edge_classifier = value.parse().map_err(invalid)?,
            "near_horizontal_deg" => self.near_horizontal_deg = parse_f64(value).map_err(invalid)?,
            "near_vertical_deg" => self.near_vertical_deg = parse_f64(value).map_err(invalid)?,
            "selection" => self.selection = value.parse().map_err(invalid)?,
            "y_normalization" => self.y_normalization = value.parse().map_err(invalid)?,
            "fov.horizontal_deg" => self.horizontal_fov_deg = parse_f64(value).map_err(invalid)?,
            "fov.vertical_deg" => self.vertical_fov_deg = parse_f64(value).map_err(invalid)?,
            "zone" => self.active_zone = value.to_string(),
            "zones.names" => self.zone_names = parse_string_list(value),
            "zones.desired_x_deg" => {
                self.zone_desired_x_deg = parse_f64_list(value).map_err(invalid)?
            }
            "zones.desired_y_deg" => {
                self.zone_desired_y_deg = parse_f64_list(value).map_err(invalid)?
            }
            "contour_color" => self.contour_color = parse_color(value).map_err(invalid)?,
            "line_color" => self.line_color = parse_color(value).map_err(invalid)?,
            "stage" => self.stage = value.parse().map_err(invalid)?,
            _ => return Err(VisionError::UnknownProperty(key.to_string())),
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &ConfigPatch) -> Result<()> {
        self.set_property(&patch.key, &patch.value)
    }
}

/// A single `key=value` property update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPatch {
    pub key: String,
    pub value: String,
}

impl ConfigPatch {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for ConfigPatch {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s.split_once('=').ok_or_else(|| VisionError::InvalidProperty {
            key: s.to_string(),
            value: String::new(),
            reason: "expected key=value".to_string(),
        })?;
        Ok(ConfigPatch::new(key.trim(), value.trim()))
    }
}

enum Bound {
    Low,
    High,
}

fn channel_key(key: &str) -> Option<(usize, Bound)> {
    let (channel, bound) = key.split_once('.')?;
    let index = match channel {
        "red" | "hue" => 0,
        "green" | "saturation" => 1,
        "blue" | "value" => 2,
        _ => return None,
    };
    let bound = match bound {
        "low" => Bound::Low,
        "high" => Bound::High,
        _ => return None,
    };
    Some((index, bound))
}

fn parse_f64(value: &str) -> std::result::Result<f64, String> {
    value.parse::<f64>().map_err(|e| e.to_string())
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("not a boolean: '{}'", other)),
    }
}

fn parse_string_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_f64_list(value: &str) -> std::result::Result<Vec<f64>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_f64)
        .collect()
}

/// Accepts `r,g,b` or `#rrggbb`.
fn parse_color(value: &str) -> std::result::Result<[u8; 3], String> {
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err("expected #rrggbb".to_string());
        }
        let channel = |i: usize| {
            let digits = hex.get(i..i + 2).ok_or_else(|| "expected #rrggbb".to_string())?;
            u8::from_str_radix(digits, 16).map_err(|e| e.to_string())
        };
        return Ok([channel(0)?, channel(2)?, channel(4)?]);
    }
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err("expected r,g,b".to_string());
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(parts) {
        *slot = part.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_range_is_inclusive() {
        let r = ChannelRange::new(0, 100);
        assert!(r.contains(0));
        assert!(r.contains(100));
        assert!(!r.contains(101));
        let inverted = ChannelRange::new(200, 10);
        assert!((0..=255u8).all(|v| !inverted.contains(v)));
    }

    #[test]
    fn set_property_updates_a_single_field() {
        let mut config = Configuration::default();
        let before = config.clone();
        config.set_property("green.low", "42").unwrap();
        assert_eq!(config.ranges[1].low, 42);
        config.ranges[1].low = before.ranges[1].low;
        assert_eq!(config, before);
    }

    #[test]
    fn hsv_keys_alias_channel_slots() {
        let mut config = Configuration::default();
        config.set_property("color_space", "hsv").unwrap();
        config.set_property("hue.high", "30").unwrap();
        config.set_property("value.low", "90").unwrap();
        assert_eq!(config.color_space, ColorSpace::Hsv);
        assert_eq!(config.ranges[0].high, 30);
        assert_eq!(config.ranges[2].low, 90);
    }

    #[test]
    fn invalid_values_leave_config_untouched() {
        let mut config = Configuration::default();
        let before = config.clone();
        assert!(matches!(
            config.set_property("red.low", "300"),
            Err(VisionError::InvalidProperty { .. })
        ));
        assert!(matches!(
            config.set_property("stage", "sideways"),
            Err(VisionError::InvalidProperty { .. })
        ));
        assert!(matches!(
            config.set_property("no.such.key", "1"),
            Err(VisionError::UnknownProperty(_))
        ));
        assert_eq!(config, before);
    }

    #[test]
    fn malformed_colors_are_rejected() {
        let mut config = Configuration::default();
        let before = config.clone();
        // Six bytes, but a multi-byte character straddles a channel boundary
        for bad in ["#a\u{e9}aaa", "#12345", "#gg0000", "1,2", "1,2,300"] {
            assert!(
                matches!(
                    config.set_property("line_color", bad),
                    Err(VisionError::InvalidProperty { .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }
        assert_eq!(config, before);
        config.set_property("contour_color", "#00FF7f").unwrap();
        assert_eq!(config.contour_color, [0, 255, 127]);
    }

    #[test]
    fn category_and_list_properties() {
        let mut config = Configuration::default();
        config.apply(&"wide.enabled=false".parse().unwrap()).unwrap();
        config.apply(&"tall.max_aspect=1.25".parse().unwrap()).unwrap();
        config.apply(&"zones.names=near, far".parse().unwrap()).unwrap();
        config.apply(&"zones.desired_x_deg=1.5, -2".parse().unwrap()).unwrap();
        config.apply(&"line_color=#ff8000".parse().unwrap()).unwrap();
        assert!(!config.wide.enabled);
        assert_eq!(config.tall.max_aspect, 1.25);
        assert_eq!(config.zone_names, vec!["near", "far"]);
        assert_eq!(config.zone_desired_x_deg, vec![1.5, -2.0]);
        assert_eq!(config.line_color, [255, 128, 0]);
        assert_eq!(
            config.enabled_categories(),
            vec![ShapeCategory::Tall, ShapeCategory::Line]
        );
    }

    #[test]
    fn aim_point_uses_half_fov() {
        let mut config = Configuration::default();
        config.horizontal_fov_deg = 40.0;
        config.vertical_fov_deg = 30.0;
        config.zone_names = vec!["a".into(), "b".into()];
        config.zone_desired_x_deg = vec![0.0, 10.0];
        config.zone_desired_y_deg = vec![0.0, -7.5];
        config.active_zone = "b".into();
        let aim = config.aim_point();
        assert!((aim.x - 0.5).abs() < 1e-12);
        assert!((aim.y + 0.5).abs() < 1e-12);

        config.active_zone = "missing".into();
        assert_eq!(config.aim_point(), Point2::ORIGIN);

        config.active_zone = "b".into();
        config.zone_desired_y_deg.truncate(1);
        assert_eq!(config.aim_point(), Point2::ORIGIN);
    }

    #[test]
    fn slope_thresholds_come_from_angles() {
        let mut config = Configuration::default();
        config.near_horizontal_deg = 45.0;
        assert!((config.near_horizontal_slope() - 1.0).abs() < 1e-9);
        assert!(config.near_vertical_slope() > 2.7);
    }

    #[test]
    fn stage_names_parse_and_order() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!("everything".parse::<Stage>().unwrap(), Stage::Full);
        assert!(Stage::Threshold < Stage::CloseHoles);
        assert!(Stage::Select < Stage::Full);
    }

    #[test]
    fn stage_value_names_match_display() {
        for stage in Stage::ALL {
            let value = stage.to_possible_value().expect("every stage is selectable");
            assert_eq!(value.get_name(), stage.name());
        }
        assert_eq!(<Stage as ValueEnum>::from_str("nothing", true).unwrap(), Stage::None);
        assert_eq!(<Stage as ValueEnum>::from_str("close-holes", false).unwrap(), Stage::CloseHoles);
    }
}
