use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage, RgbImage};
use log::debug;

use crate::config::{Configuration, Stage};
use crate::detection::threshold::{self, ChannelBuffers};
use crate::detection::{annotate, classify, contours, morphology, select, try_alloc_gray};
use crate::error::{Result, VisionError};
use crate::models::{Candidate, TargetReport};
use crate::sinks::{DebugImageSink, LogTelemetry, TelemetrySink};
use crate::snapshot::FrameSnapshotter;

/// Image returned by one pipeline call.
///
/// The mask stages hand back a different kind of image than the later
/// stages, so the two are kept apart.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedImage {
    /// Binary mask after thresholding (and hole closing).
    Mask(GrayImage),
    /// The input frame, annotated when the stage draws anything.
    Frame(RgbImage),
}

impl ProcessedImage {
    pub fn as_mask(&self) -> Option<&GrayImage> {
        match self {
            ProcessedImage::Mask(mask) => Some(mask),
            ProcessedImage::Frame(_) => None,
        }
    }

    pub fn as_frame(&self) -> Option<&RgbImage> {
        match self {
            ProcessedImage::Frame(frame) => Some(frame),
            ProcessedImage::Mask(_) => None,
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            ProcessedImage::Mask(mask) => DynamicImage::ImageLuma8(mask),
            ProcessedImage::Frame(frame) => DynamicImage::ImageRgb8(frame),
        }
    }
}

/// Everything one call produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub stage: Stage,
    pub image: ProcessedImage,
    /// One per enabled category from the `select` stage on, empty before.
    pub reports: Vec<TargetReport>,
    /// Classified candidates in discovery order.
    pub candidates: Vec<Candidate>,
    pub elapsed: Duration,
}

impl PipelineOutput {
    fn early(stage: Stage, image: ProcessedImage, start: Instant) -> Self {
        Self {
            stage,
            image,
            reports: Vec::new(),
            candidates: Vec::new(),
            elapsed: start.elapsed(),
        }
    }
}

/// Buffers reused across frames of the same size.
struct Scratch {
    size: (u32, u32),
    mask: GrayImage,
    channels: ChannelBuffers,
}

impl Scratch {
    fn allocate(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            size: (width, height),
            mask: try_alloc_gray(width, height)?,
            channels: ChannelBuffers::allocate(width, height)?,
        })
    }
}

/// Frame-processing controller.
///
/// One instance per video stream: scratch buffers are mutated in place, so
/// calls on the same instance must not overlap.
pub struct TargetPipeline {
    scratch: Option<Scratch>,
    reallocations: usize,
    telemetry: Option<Box<dyn TelemetrySink>>,
    debug: Option<Box<dyn DebugImageSink>>,
    snapshots: Option<FrameSnapshotter>,
}

impl TargetPipeline {
    /// Pipeline that logs its telemetry.
    pub fn new() -> Self {
        Self {
            scratch: None,
            reallocations: 0,
            telemetry: Some(Box::new(LogTelemetry)),
            debug: None,
            snapshots: None,
        }
    }

    pub fn with_telemetry(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn without_telemetry(mut self) -> Self {
        self.telemetry = None;
        self
    }

    pub fn with_debug_sink(mut self, sink: Box<dyn DebugImageSink>) -> Self {
        self.debug = Some(sink);
        self
    }

    pub fn with_snapshots(mut self, snapshotter: FrameSnapshotter) -> Self {
        self.snapshots = Some(snapshotter);
        self
    }

    /// Number of times scratch buffers have been (re)allocated.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Frees scratch buffers and stops the snapshot writer.
    pub fn release(&mut self) {
        self.scratch = None;
        if let Some(mut snapshots) = self.snapshots.take() {
            snapshots.shutdown();
        }
    }

    /// Converts any channel layout or bit depth to 8-bit RGB, then processes.
    pub fn process_dynamic(
        &mut self,
        frame: &DynamicImage,
        config: &Configuration,
    ) -> Result<PipelineOutput> {
        match frame {
            DynamicImage::ImageRgb8(rgb) => self.process(rgb, config),
            other => self.process(&other.to_rgb8(), config),
        }
    }

    /// Runs the pipeline up to `config.stage`.
    pub fn process(&mut self, frame: &RgbImage, config: &Configuration) -> Result<PipelineOutput> {
        let start = Instant::now();
        let stage = config.stage;
        let (width, height) = frame.dimensions();

        if let Some(snapshots) = self.snapshots.as_mut() {
            snapshots.offer(frame);
        }
        show(&mut self.debug, "raw", || DynamicImage::ImageRgb8(frame.clone()));

        // With a debug sink attached every intermediate is still produced;
        // the image for an early stage is held until the last one is shown.
        let observing = self.debug.is_some();
        let mut held: Option<ProcessedImage> = None;

        if stage == Stage::None {
            held = Some(ProcessedImage::Frame(frame.clone()));
        }
        if let Some(output) = finish_early(&mut held, observing, stage, start) {
            return Ok(output);
        }

        let scratch = scratch_for(&mut self.scratch, &mut self.reallocations, width, height)?;
        let Scratch { mask, channels, .. } = scratch;

        threshold::threshold_into(frame, config.color_space, &config.ranges, channels, mask);
        show(&mut self.debug, "threshold", || DynamicImage::ImageLuma8(mask.clone()));

        if stage == Stage::Threshold {
            held = Some(ProcessedImage::Mask(mask.clone()));
        }
        if let Some(output) = finish_early(&mut held, observing, stage, start) {
            return Ok(output);
        }

        morphology::close_holes(mask, config.hole_closing_iterations);
        show(&mut self.debug, "close-holes", || DynamicImage::ImageLuma8(mask.clone()));

        if stage == Stage::CloseHoles {
            held = Some(ProcessedImage::Mask(mask.clone()));
        }
        if let Some(output) = finish_early(&mut held, observing, stage, start) {
            return Ok(output);
        }

        let extracted = contours::extract(mask, config.polygon_epsilon);
        debug!("Found {} external contours", extracted.len());

        if observing || stage == Stage::Contours {
            let mut outlined = frame.clone();
            annotate::draw_contours(&mut outlined, extracted.iter().map(|e| &e.raw), config.contour_color);
            show(&mut self.debug, "contours", || DynamicImage::ImageRgb8(outlined.clone()));
            if stage == Stage::Contours {
                held = Some(ProcessedImage::Frame(outlined));
            }
        }
        if let Some(output) = finish_early(&mut held, observing, stage, start) {
            return Ok(output);
        }

        if observing || stage == Stage::ConvexHull {
            let mut hulls = frame.clone();
            annotate::draw_contours(&mut hulls, extracted.iter().map(|e| &e.hull), config.contour_color);
            show(&mut self.debug, "convex-hull", || DynamicImage::ImageRgb8(hulls.clone()));
            if stage == Stage::ConvexHull {
                held = Some(ProcessedImage::Frame(hulls));
            }
        }
        if let Some(image) = held {
            return Ok(PipelineOutput::early(stage, image, start));
        }

        let aim = config.aim_point();
        let candidates =
            classify::classify_all(extracted.iter().map(|e| &e.polygon), width, height, config, aim);
        let winners = select::select_per_category(&candidates, config);

        let mut annotated = frame.clone();
        annotate::draw_contours(
            &mut annotated,
            winners.iter().filter_map(|(_, w)| w.map(|i| &candidates[i].polygon)),
            config.contour_color,
        );

        let reports: Vec<TargetReport> = winners
            .iter()
            .map(|&(category, winner)| {
                select::report(category, winner.map(|i| &candidates[i]), width, height, aim, config)
            })
            .collect();

        if stage >= Stage::Calculate {
            let centroids: Vec<_> = winners
                .iter()
                .filter_map(|(_, w)| w.map(|i| candidates[i].centroid))
                .collect();
            annotate::draw_offsets(&mut annotated, aim, &centroids, config.line_color);
        }

        let elapsed = start.elapsed();
        if stage == Stage::Full {
            if let Some(telemetry) = self.telemetry.as_mut() {
                telemetry.publish(&reports, elapsed);
            }
        }

        Ok(PipelineOutput {
            stage,
            image: ProcessedImage::Frame(annotated),
            reports,
            candidates,
            elapsed,
        })
    }
}

impl Default for TargetPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch buffers for a `width`x`height` frame, reallocated only when the
/// frame size changes.
fn scratch_for<'a>(
    slot: &'a mut Option<Scratch>,
    reallocations: &mut usize,
    width: u32,
    height: u32,
) -> Result<&'a mut Scratch> {
    let stale = slot.as_ref().is_none_or(|s| s.size != (width, height));
    if stale {
        *slot = Some(Scratch::allocate(width, height)?);
        *reallocations += 1;
        debug!("Allocated scratch buffers for {}x{}", width, height);
    }
    slot.as_mut()
        .ok_or(VisionError::ScratchAllocation { width, height })
}

/// Output for an early stage, unless a debug sink still wants the later
/// intermediates.
fn finish_early(
    held: &mut Option<ProcessedImage>,
    observing: bool,
    stage: Stage,
    start: Instant,
) -> Option<PipelineOutput> {
    if observing {
        return None;
    }
    held.take().map(|image| PipelineOutput::early(stage, image, start))
}

fn show(
    sink: &mut Option<Box<dyn DebugImageSink>>,
    name: &str,
    image: impl FnOnce() -> DynamicImage,
) {
    if let Some(sink) = sink.as_mut() {
        sink.show(name, &image());
    }
}
