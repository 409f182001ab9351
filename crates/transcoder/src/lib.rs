pub mod encode;
pub mod ffprobe;
pub mod processor;
pub mod script;
pub mod tools;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("input file not found: {0}")]
    InputNotFound(String),
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),
    #[error("ffmpeg timed out after {0}s")]
    TimedOut(u64),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    /// Message reported to webhook callers.
    pub fn client_message(&self) -> String {
        match self {
            Self::InputNotFound(name) => format!("Input file not found: {name}"),
            Self::ProbeFailed(_) | Self::NoVideoStream => {
                "Failed to extract video metadata".to_string()
            }
            Self::FfmpegFailed(detail) => format!("Video processing failed: {detail}"),
            Self::TimedOut(secs) => {
                format!("Video processing failed: ffmpeg timed out after {secs} seconds")
            }
            Self::Io(e) => format!("Processing error: {e}"),
        }
    }
}

/// Global transcoder configuration.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
    /// Upper bound on a single ffmpeg run; `None` waits indefinitely.
    pub transcode_timeout: Option<Duration>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            transcode_timeout: None,
        }
    }
}
