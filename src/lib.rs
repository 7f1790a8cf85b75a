use std::path::PathBuf;

pub mod config;
pub mod util;
pub mod video;

pub use config::{CompositionConfig, Config, DetectionConfig};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("input video not found at: {0:?}")]
    InputNotFound(PathBuf),
    #[error("no video stream found in: {0:?}")]
    MissingVideoStream(PathBuf),
    #[error("failed to initialize output writer at: {0:?}")]
    OutputInit(PathBuf),
    #[error("timeline file not found at: {0:?}")]
    TimelineNotFound(PathBuf),
    #[error("timeline has {0} event(s), but at least 2 are needed to derive segment durations")]
    TimelineTooShort(usize),
    #[error("no usable source videos found in: {0:?}")]
    EmptySourcePool(PathBuf),
    #[error("clip extraction failed: {0}")]
    ClipExtraction(String),
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
