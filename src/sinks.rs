use std::path::PathBuf;
use std::time::Duration;

use image::DynamicImage;
use log::info;

use crate::error::Result;
use crate::models::TargetReport;

/// Receives per-frame results at the `full` stage.
pub trait TelemetrySink: Send {
    fn publish(&mut self, reports: &[TargetReport], elapsed: Duration);
}

/// Receives named intermediate images for display.
///
/// Images are copies; nothing a sink does can affect the pipeline output.
pub trait DebugImageSink: Send {
    fn show(&mut self, name: &str, image: &DynamicImage);
}

/// Telemetry sink used when no live consumer is attached
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn publish(&mut self, reports: &[TargetReport], elapsed: Duration) {
        for r in reports {
            if r.found {
                info!(
                    "{}: found x={:.4} y={:.4} ({:.2}°, {:.2}°)",
                    r.category, r.offset_x, r.offset_y, r.angle_x_deg, r.angle_y_deg
                );
            } else {
                info!("{}: not found", r.category);
            }
        }
        info!("Processed in {:.3} ms", elapsed.as_secs_f64() * 1e3);
    }
}

/// Writes every intermediate image as a PNG into one directory.
///
/// Files are named `<frame>_<index>_<name>.png`, e.g. `0003_02_threshold.png`.
pub struct DirectoryDebugSink {
    output_dir: PathBuf,
    frame: usize,
    index: usize,
}

impl DirectoryDebugSink {
    /// The directory must be empty or non-existent.
    pub fn new(output_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let output_dir = output_dir.into();
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            output_dir,
            frame: 0,
            index: 0,
        })
    }

    fn save(&mut self, name: &str, image: &DynamicImage) -> Result<PathBuf> {
        // "raw" opens a new frame
        if name == "raw" {
            self.frame += 1;
            self.index = 0;
        }
        self.index += 1;
        let filename = format!(
            "{:04}_{:02}_{}.png",
            self.frame,
            self.index,
            name.to_lowercase().replace([' ', '-'], "_")
        );
        let path = self.output_dir.join(filename);
        image.save(&path)?;
        Ok(path)
    }
}

impl DebugImageSink for DirectoryDebugSink {
    fn show(&mut self, name: &str, image: &DynamicImage) {
        match self.save(name, image) {
            Ok(path) => log::debug!("Debug: saved {}", path.display()),
            Err(e) => log::warn!("Failed to save debug image '{}': {}", name, e),
        }
    }
}
