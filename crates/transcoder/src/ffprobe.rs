use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::TranscodeError;

/// Container and stream metadata extracted via ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: f64,
    pub size: u64,
    pub bitrate: u64,
    pub format_name: String,
    pub video: VideoStream,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: Option<u64>,
    pub pixel_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub bitrate: Option<u64>,
}

/// Run ffprobe on a file and parse the JSON output.
pub async fn probe(ffprobe_path: &Path, file: &Path) -> Result<VideoMetadata, TranscodeError> {
    let output = tokio::process::Command::new(ffprobe_path)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(file)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TranscodeError::ProbeFailed(format!("spawn failed: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscodeError::ProbeFailed(format!(
            "{}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let raw: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| TranscodeError::ProbeFailed(format!("parse JSON: {e}")))?;

    parse_probe_output(&raw)
}

pub(crate) fn parse_probe_output(raw: &serde_json::Value) -> Result<VideoMetadata, TranscodeError> {
    let format = raw
        .get("format")
        .ok_or_else(|| TranscodeError::ProbeFailed("missing 'format'".into()))?;

    let streams = raw
        .get("streams")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let first_of = |kind: &str| {
        streams
            .iter()
            .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some(kind))
    };

    let video = first_of("video").ok_or(TranscodeError::NoVideoStream)?;
    let audio = first_of("audio");

    Ok(VideoMetadata {
        duration: number_f64(format.get("duration")).unwrap_or(0.0),
        size: number_u64(format.get("size")).unwrap_or(0),
        bitrate: number_u64(format.get("bit_rate")).unwrap_or(0),
        format_name: string(format.get("format_name")),
        video: VideoStream {
            codec: string(video.get("codec_name")),
            width: number_u64(video.get("width")).unwrap_or(0) as u32,
            height: number_u64(video.get("height")).unwrap_or(0) as u32,
            fps: frame_rate(video),
            bitrate: number_u64(video.get("bit_rate")),
            pixel_format: string(video.get("pix_fmt")),
        },
        audio: audio.map(|a| AudioStream {
            codec: string(a.get("codec_name")),
            sample_rate: number_u64(a.get("sample_rate")).unwrap_or(0) as u32,
            channels: number_u64(a.get("channels")).unwrap_or(0) as u32,
            bitrate: number_u64(a.get("bit_rate")),
        }),
    })
}

/// `r_frame_rate` wins over `avg_frame_rate`; unusable values give 0.0.
fn frame_rate(stream: &serde_json::Value) -> f64 {
    stream
        .get("r_frame_rate")
        .or_else(|| stream.get("avg_frame_rate"))
        .and_then(|v| v.as_str())
        .and_then(parse_fraction)
        .unwrap_or(0.0)
}

fn parse_fraction(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d > 0.0 { Some(n / d) } else { None }
    } else {
        s.parse().ok()
    }
}

// ffprobe emits most numbers as JSON strings; accept both shapes.
fn number_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    match v? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn number_u64(v: Option<&serde_json::Value>) -> Option<u64> {
    match v? {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        other => other.as_u64(),
    }
}

fn string(v: Option<&serde_json::Value>) -> String {
    v.and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "12.345000",
                "size": "1048576",
                "bit_rate": "679477"
            },
            "streams": [
                {
                    "index": 0,
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2,
                    "bit_rate": "128000"
                },
                {
                    "index": 1,
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "pix_fmt": "yuv420p",
                    "r_frame_rate": "30000/1001",
                    "avg_frame_rate": "25/1"
                },
                {
                    "index": 2,
                    "codec_type": "video",
                    "codec_name": "mjpeg",
                    "width": 320,
                    "height": 180
                }
            ]
        })
    }

    #[test]
    fn parse_probe_json() {
        let meta = parse_probe_output(&sample()).unwrap();
        assert_eq!(meta.format_name, "mov,mp4,m4a,3gp,3g2,mj2");
        assert!((meta.duration - 12.345).abs() < 1e-9);
        assert_eq!(meta.size, 1_048_576);
        assert_eq!(meta.bitrate, 679_477);

        assert_eq!(meta.video.codec, "h264");
        assert_eq!(meta.video.width, 1920);
        assert_eq!(meta.video.height, 1080);
        assert_eq!(meta.video.pixel_format, "yuv420p");
        assert!((meta.video.fps - 29.97).abs() < 0.01);
        assert_eq!(meta.video.bitrate, None);

        let audio = meta.audio.unwrap();
        assert_eq!(audio.codec, "aac");
        assert_eq!(audio.sample_rate, 48_000);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.bitrate, Some(128_000));
    }

    #[test]
    fn reexposed_values_match_probe() {
        let raw = sample();
        let meta = parse_probe_output(&raw).unwrap();
        let out = serde_json::to_value(&meta).unwrap();

        let probed_duration: f64 = raw["format"]["duration"].as_str().unwrap().parse().unwrap();
        let probed_size: u64 = raw["format"]["size"].as_str().unwrap().parse().unwrap();
        assert_eq!(out["duration"].as_f64().unwrap(), probed_duration);
        assert_eq!(out["size"].as_u64().unwrap(), probed_size);
        assert_eq!(out["video"]["codec"], raw["streams"][1]["codec_name"]);
        assert!(out["video"]["bitrate"].is_null());
    }

    #[test]
    fn audio_key_omitted_without_audio_stream() {
        let raw = serde_json::json!({
            "format": { "format_name": "matroska,webm", "duration": "1.0" },
            "streams": [
                { "codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360,
                  "avg_frame_rate": "24/1" }
            ]
        });
        let meta = parse_probe_output(&raw).unwrap();
        assert!(meta.audio.is_none());
        assert_eq!(meta.size, 0);
        assert!((meta.video.fps - 24.0).abs() < 1e-9);

        let out = serde_json::to_value(&meta).unwrap();
        assert!(out.get("audio").is_none());
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let raw = serde_json::json!({
            "format": { "format_name": "mp3" },
            "streams": [ { "codec_type": "audio", "codec_name": "mp3" } ]
        });
        assert!(matches!(
            parse_probe_output(&raw),
            Err(TranscodeError::NoVideoStream)
        ));
    }

    #[test]
    fn missing_format_is_an_error() {
        let raw = serde_json::json!({ "streams": [] });
        assert!(matches!(
            parse_probe_output(&raw),
            Err(TranscodeError::ProbeFailed(_))
        ));
    }

    #[test]
    fn parse_fraction_works() {
        assert!((parse_fraction("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert!((parse_fraction("30").unwrap() - 30.0).abs() < 0.001);
        assert!(parse_fraction("0/0").is_none());
        assert!(parse_fraction("abc").is_none());
    }

    #[tokio::test]
    async fn probe_reports_missing_binary() {
        let err = probe(
            Path::new("/nonexistent/ffprobe-binary"),
            Path::new("/nonexistent/clip.mp4"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TranscodeError::ProbeFailed(_)));
    }
}
