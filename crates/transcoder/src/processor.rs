use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tempfile::TempPath;
use tracing::{error, info, warn};
use vidhook_core::filename::{is_plain_file_name, split_extension};
use vidhook_core::types::ProcessingParams;
use vidhook_core::units::{bytes_to_mb, format_duration, format_file_size, round2};

use crate::encode::{EncodePlan, run_ffmpeg};
use crate::ffprobe::{self, VideoMetadata};
use crate::{TranscodeError, TranscoderConfig, tools};

/// Size comparison between the upload and the processed output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSizeReduction {
    pub original_size_mb: f64,
    pub processed_size_mb: f64,
    pub reduction_percent: f64,
}

impl FileSizeReduction {
    /// `None` unless both sizes are known (nonzero).
    pub fn compute(original_bytes: u64, processed_bytes: u64) -> Option<Self> {
        if original_bytes == 0 || processed_bytes == 0 {
            return None;
        }
        let original = original_bytes as f64;
        let processed = processed_bytes as f64;
        Some(Self {
            original_size_mb: bytes_to_mb(original_bytes),
            processed_size_mb: bytes_to_mb(processed_bytes),
            reduction_percent: round2((original - processed) / original * 100.0),
        })
    }
}

/// Outcome of a successful transcode.
#[derive(Debug, Clone)]
pub struct ProcessedVideo {
    pub output_file: String,
    pub metadata: VideoMetadata,
    /// Wall-clock seconds, two decimals.
    pub processing_time: f64,
    pub file_size_reduction: Option<FileSizeReduction>,
}

/// Owns the upload/processed directories and drives ffprobe/ffmpeg.
pub struct VideoProcessor {
    config: TranscoderConfig,
}

impl VideoProcessor {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::create_dir_all(&self.config.processed_dir).await
    }

    pub fn upload_path(&self, file_name: &str) -> PathBuf {
        self.config.upload_dir.join(file_name)
    }

    /// Resolve a download name inside the processed directory.
    /// Anything that is not a single plain path component is refused.
    pub fn processed_path(&self, file_name: &str) -> Option<PathBuf> {
        is_plain_file_name(file_name).then(|| self.config.processed_dir.join(file_name))
    }

    pub async fn ffmpeg_available(&self) -> bool {
        tools::ffmpeg_available(&self.config.ffmpeg_path).await
    }

    pub async fn extract_metadata(&self, input: &Path) -> Result<VideoMetadata, TranscodeError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            error!(path = ?input, "file not found");
            return Err(TranscodeError::InputNotFound(display_name(input)));
        }

        ffprobe::probe(&self.config.ffprobe_path, input)
            .await
            .inspect_err(|e| error!(path = ?input, error = %e, "metadata extraction failed"))
    }

    /// Transcode an upload according to `params`.
    ///
    /// The upload is consumed: it is removed from disk when this returns, on
    /// every path. A partially written output is removed on failure.
    pub async fn process_video(
        &self,
        input: TempPath,
        params: &ProcessingParams,
    ) -> Result<ProcessedVideo, TranscodeError> {
        let started = Instant::now();
        let input_name = display_name(&input);

        let original = self.extract_metadata(&input).await?;

        let (stem, _) = split_extension(&input_name);
        let output_file = format!("{stem}_processed.{}", params.output_format.extension());
        let output = TempPath::try_from_path(self.config.processed_dir.join(&output_file))?;

        let plan = EncodePlan::from_params(params);
        let args = plan.to_args(&input, &output);

        info!(input = %input_name, output = %output_file, ?params, "starting video processing");
        run_ffmpeg(&self.config.ffmpeg_path, &args, self.config.transcode_timeout).await?;

        let processing_time = round2(started.elapsed().as_secs_f64());

        let processed = match ffprobe::probe(&self.config.ffprobe_path, &output).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(output = %output_file, error = %e, "could not probe processed file");
                None
            }
        };

        let processed_size = processed.as_ref().map(|m| m.size).unwrap_or(0);
        let file_size_reduction = FileSizeReduction::compute(original.size, processed_size);

        output
            .keep()
            .map_err(|e| TranscodeError::Io(e.error))?;

        if let Err(e) = input.close() {
            warn!(input = %input_name, error = %e, "failed to clean up original file");
        }

        info!(
            output = %output_file,
            took = %format_duration(processing_time),
            original = %format_file_size(original.size),
            processed = %format_file_size(processed_size),
            "video processing completed"
        );

        Ok(ProcessedVideo {
            output_file,
            metadata: processed.unwrap_or(original),
            processing_time,
            file_size_reduction,
        })
    }

    /// Delete files older than `max_age` from the upload and processed
    /// directories. Returns how many were removed.
    pub async fn cleanup_old_files(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;

        for dir in [&self.config.upload_dir, &self.config.processed_dir] {
            match remove_older_than(dir, now, max_age).await {
                Ok(n) => removed += n,
                Err(e) => error!(dir = ?dir, error = %e, "error cleaning up files"),
            }
        }

        removed
    }
}

async fn remove_older_than(
    dir: &Path,
    now: SystemTime,
    max_age: Duration,
) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name() == ".gitkeep" {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age > max_age {
            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(path = ?path, "cleaned up old file");
                    removed += 1;
                }
                Err(e) => warn!(path = ?path, error = %e, "failed to remove old file"),
            }
        }
    }

    Ok(removed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
