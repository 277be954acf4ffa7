use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No segmentation open")]
    NoSegmentationLoaded,

    #[error("No drawing (hint: use the Draw control to select a pen)")]
    NoActivePen,

    #[error("Rendering surface is not attached")]
    AdapterUnavailable,

    #[error("Edit buffer covers {actual} voxels but the mask has {expected}")]
    EditBufferMismatch { expected: usize, actual: usize },

    #[error("Volume load failed: {0}")]
    VolumeLoad(String),
}

impl ViewerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
