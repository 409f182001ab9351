use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Output container requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Avi,
    Mov,
    Webm,
    Mkv,
}

impl OutputFormat {
    pub const ALL: [Self; 5] = [Self::Mp4, Self::Avi, Self::Mov, Self::Webm, Self::Mkv];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Webm => "webm",
            Self::Mkv => "mkv",
        }
    }

    /// File extension of the produced output.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, &Self::ALL, Self::as_str)
            .ok_or_else(|| invalid("Invalid output format", &Self::ALL, Self::as_str))
    }
}

/// Encoding quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl Quality {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Ultra];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, &Self::ALL, Self::as_str)
            .ok_or_else(|| invalid("Invalid quality setting", &Self::ALL, Self::as_str))
    }
}

/// Target frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "4k")]
    K4,
}

impl Resolution {
    pub const ALL: [Self; 5] = [Self::P480, Self::P720, Self::P1080, Self::P1440, Self::K4];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::K4 => "4k",
        }
    }

    /// Pixel dimensions `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::P480 => (854, 480),
            Self::P720 => (1280, 720),
            Self::P1080 => (1920, 1080),
            Self::P1440 => (2560, 1440),
            Self::K4 => (3840, 2160),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, &Self::ALL, Self::as_str)
            .ok_or_else(|| invalid("Invalid resolution", &Self::ALL, Self::as_str))
    }
}

/// Validated processing parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingParams {
    pub output_format: OutputFormat,
    pub quality: Quality,
    pub resolution: Option<Resolution>,
    pub compress: bool,
}

impl ProcessingParams {
    /// Build from raw form values. Missing or blank fields take their defaults.
    pub fn from_fields(
        output_format: Option<&str>,
        quality: Option<&str>,
        resolution: Option<&str>,
        compress: Option<&str>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            output_format: non_blank(output_format)
                .map(str::parse::<OutputFormat>)
                .transpose()?
                .unwrap_or_default(),
            quality: non_blank(quality)
                .map(str::parse::<Quality>)
                .transpose()?
                .unwrap_or_default(),
            resolution: non_blank(resolution)
                .map(str::parse::<Resolution>)
                .transpose()?,
            compress: non_blank(compress).is_some_and(parse_flag),
        })
    }
}

/// Truthy form values: `true`, `1`, `yes`, `on` (case-insensitive).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_choice<T: Copy>(s: &str, all: &[T], name: fn(T) -> &'static str) -> Option<T> {
    let wanted = s.trim().to_ascii_lowercase();
    all.iter().copied().find(|v| name(*v) == wanted)
}

fn invalid<T: Copy>(prefix: &str, all: &[T], name: fn(T) -> &'static str) -> ApiError {
    let supported: Vec<&str> = all.iter().map(|v| name(*v)).collect();
    ApiError::BadRequest(format!("{prefix}. Supported: {}", supported.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = ProcessingParams::from_fields(None, None, None, None).unwrap();
        assert_eq!(p.output_format, OutputFormat::Mp4);
        assert_eq!(p.quality, Quality::Medium);
        assert_eq!(p.resolution, None);
        assert!(!p.compress);
    }

    #[test]
    fn parses_case_insensitively() {
        let p = ProcessingParams::from_fields(Some("WebM"), Some("ULTRA"), Some("4K"), Some("True"))
            .unwrap();
        assert_eq!(p.output_format, OutputFormat::Webm);
        assert_eq!(p.quality, Quality::Ultra);
        assert_eq!(p.resolution, Some(Resolution::K4));
        assert!(p.compress);
    }

    #[test]
    fn blank_fields_are_absent() {
        let p = ProcessingParams::from_fields(Some(""), Some("  "), Some(""), Some("")).unwrap();
        assert_eq!(p, ProcessingParams::default());
    }

    #[test]
    fn rejects_unknown_values() {
        let err = ProcessingParams::from_fields(Some("gif"), None, None, None).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid output format. Supported: mp4, avi, mov, webm, mkv"
        );

        let err = ProcessingParams::from_fields(None, Some("best"), None, None).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid quality setting. Supported: low, medium, high, ultra"
        );

        let err = ProcessingParams::from_fields(None, None, Some("8k"), None).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid resolution. Supported: 480p, 720p, 1080p, 1440p, 4k"
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn flags() {
        for v in ["true", "TRUE", "1", "yes", "on"] {
            assert!(parse_flag(v), "{v} should be truthy");
        }
        for v in ["false", "0", "no", "off", "maybe"] {
            assert!(!parse_flag(v), "{v} should be falsy");
        }
    }

    #[test]
    fn resolution_dimensions() {
        assert_eq!(Resolution::P480.dimensions(), (854, 480));
        assert_eq!(Resolution::K4.dimensions(), (3840, 2160));
        assert_eq!(Resolution::P1440.to_string(), "1440p");
    }
}
