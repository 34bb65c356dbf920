mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from targetsight for tests
pub use targetsight::{
    CategoryBounds, ChannelRange, Configuration, DebugImageSink, ProcessedImage,
    SelectionStrategy, ShapeCategory, Stage, TargetPipeline, TargetReport, TelemetrySink,
};
