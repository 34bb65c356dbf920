use thiserror::Error;

/// Errors raised by the vision pipeline and its collaborators.
///
/// "Target not found" is never an error; it is reported through
/// [`crate::TargetReport`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VisionError {
    #[error("failed to allocate scratch buffers for a {width}x{height} frame")]
    ScratchAllocation { width: u32, height: u32 },

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("invalid value {value:?} for property {key}: {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot worker: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, VisionError>;
