pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod models;
pub mod pipeline;
pub mod sinks;
pub mod snapshot;

pub use config::{
    CategoryBounds, ChannelRange, ColorSpace, ConfigPatch, Configuration, EdgeClassifier,
    SelectionStrategy, Stage, YNormalization,
};
pub use error::{Result, VisionError};
pub use geometry::{BoundingBox, Point2};
pub use models::{Candidate, Contour, ShapeCategory, TargetReport};
pub use pipeline::{PipelineOutput, ProcessedImage, TargetPipeline};
pub use sinks::{DebugImageSink, DirectoryDebugSink, LogTelemetry, TelemetrySink};
pub use snapshot::FrameSnapshotter;
