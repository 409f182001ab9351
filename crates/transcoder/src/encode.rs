//! Translation of processing parameters into an ffmpeg invocation.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, info};
use vidhook_core::types::{OutputFormat, ProcessingParams, Quality};

use crate::TranscodeError;

/// CRF added when the caller asks for extra compression.
pub const COMPRESS_CRF_OFFSET: u8 = 5;
/// CRF ceiling after the compression offset is applied.
pub const MAX_COMPRESSED_CRF: u8 = 32;
/// Preset forced by the compression flag.
pub const COMPRESS_PRESET: &str = "fast";

/// Concrete encoder settings for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    pub video_codec: Option<&'static str>,
    pub audio_codec: Option<&'static str>,
    pub crf: u8,
    pub preset: &'static str,
    pub scale: Option<(u32, u32)>,
}

/// `(video, audio)` encoder pair for a container. `None` leaves ffmpeg's defaults.
pub fn codecs_for(format: OutputFormat) -> Option<(&'static str, &'static str)> {
    match format {
        OutputFormat::Mp4 | OutputFormat::Mov => Some(("libx264", "aac")),
        OutputFormat::Webm => Some(("libvpx-vp9", "libvorbis")),
        OutputFormat::Avi => Some(("libx264", "mp3")),
        OutputFormat::Mkv => None,
    }
}

/// `(crf, preset)` for a quality tier. Higher quality means lower CRF and a slower preset.
pub fn quality_preset(quality: Quality) -> (u8, &'static str) {
    match quality {
        Quality::Low => (28, "fast"),
        Quality::Medium => (23, "medium"),
        Quality::High => (18, "slow"),
        Quality::Ultra => (15, "veryslow"),
    }
}

impl EncodePlan {
    pub fn from_params(params: &ProcessingParams) -> Self {
        let codecs = codecs_for(params.output_format);
        let (mut crf, mut preset) = quality_preset(params.quality);

        if params.compress {
            crf = (crf + COMPRESS_CRF_OFFSET).min(MAX_COMPRESSED_CRF);
            preset = COMPRESS_PRESET;
        }

        Self {
            video_codec: codecs.map(|(v, _)| v),
            audio_codec: codecs.map(|(_, a)| a),
            crf,
            preset,
            scale: params.resolution.map(|r| r.dimensions()),
        }
    }

    /// Full ffmpeg argument vector, output overwritten if present.
    pub fn to_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

        args.extend(["-i".into(), input.to_string_lossy().into_owned()]);

        if let Some((w, h)) = self.scale {
            args.extend(["-vf".into(), format!("scale={w}:{h}")]);
        }

        if let Some(vc) = self.video_codec {
            args.extend(["-c:v".into(), vc.into()]);
        }
        if let Some(ac) = self.audio_codec {
            args.extend(["-c:a".into(), ac.into()]);
        }

        args.extend([
            "-crf".into(),
            self.crf.to_string(),
            "-preset".into(),
            self.preset.into(),
        ]);

        args.push(output.to_string_lossy().into_owned());
        args
    }
}

/// Run ffmpeg to completion, capturing its output.
///
/// A nonzero exit is reported with the raw stderr. When `timeout` elapses the
/// child is killed.
pub async fn run_ffmpeg(
    ffmpeg_path: &Path,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<(), TranscodeError> {
    info!(?ffmpeg_path, ?args, "running ffmpeg");

    let child = tokio::process::Command::new(ffmpeg_path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TranscodeError::FfmpegFailed(format!("spawn: {e}")))?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| TranscodeError::TimedOut(limit.as_secs()))??,
        None => child.wait_with_output().await?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscodeError::FfmpegFailed(format!(
            "{}: {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!(stderr_bytes = output.stderr.len(), "ffmpeg finished");
    Ok(())
}
