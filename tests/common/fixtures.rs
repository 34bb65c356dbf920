use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use targetsight::{
    CategoryBounds, ChannelRange, Configuration, DebugImageSink, TargetReport, TelemetrySink,
};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const RED: Rgb<u8> = Rgb([220, 20, 20]);
pub const BLUE: Rgb<u8> = Rgb([20, 20, 220]);

/// Axis-aligned rectangle `(x, y, width, height)`.
pub type Rect = (u32, u32, u32, u32);

/// Black frame with the given rectangles filled in `color`.
pub fn frame_with_rects(width: u32, height: u32, rects: &[Rect], color: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = rects
            .iter()
            .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
        if inside { color } else { Rgb([0, 0, 0]) }
    })
}

/// Rectangle of `width` x `height` centered on `(cx, cy)`.
pub fn centered(cx: u32, cy: u32, width: u32, height: u32) -> Rect {
    (cx - width / 2, cy - height / 2, width, height)
}

/// Configuration selecting bright pixels, no hole closing, tight simplification.
pub fn white_target_config(stage: targetsight::Stage) -> Configuration {
    Configuration {
        ranges: [ChannelRange::new(200, 255); 3],
        hole_closing_iterations: 0,
        polygon_epsilon: 3.0,
        min_area_ratio: 0.005,
        tall: CategoryBounds::new(0.5, 0.8),
        wide: CategoryBounds::new(1.5, 3.0),
        line: CategoryBounds::new(0.02, 0.3),
        stage,
        ..Configuration::default()
    }
}

/// Telemetry sink that keeps every publication for inspection.
#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    pub published: Arc<Mutex<Vec<(Vec<TargetReport>, Duration)>>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&mut self, reports: &[TargetReport], elapsed: Duration) {
        self.published
            .lock()
            .expect("telemetry lock poisoned")
            .push((reports.to_vec(), elapsed));
    }
}

/// Debug sink that records image names and dimensions.
#[derive(Clone, Default)]
pub struct RecordingDebugSink {
    pub shown: Arc<Mutex<Vec<(String, u32, u32)>>>,
}

impl DebugImageSink for RecordingDebugSink {
    fn show(&mut self, name: &str, image: &DynamicImage) {
        self.shown
            .lock()
            .expect("debug lock poisoned")
            .push((name.to_string(), image.width(), image.height()));
    }
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} ± {}, got {}",
        expected,
        tolerance,
        actual
    );
}
