use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use vidhook_core::types::parse_flag;
use vidhook_transcoder::TranscoderConfig;
use vidhook_transcoder::script::ScriptConfig;

/// Environment variables understood by the server.
#[derive(Debug, Clone, Copy)]
pub enum EnvKey {
    Bind,
    UploadDir,
    ProcessedDir,
    Ffmpeg,
    Ffprobe,
    MaxUploadMb,
    TranscodeTimeoutSecs,
    EnableScripts,
    ScriptShell,
    ScriptDir,
    ScriptOutput,
    ScriptTimeoutSecs,
    CleanupMaxAgeHours,
    CleanupIntervalSecs,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "VIDHOOK_BIND",
            Self::UploadDir => "VIDHOOK_UPLOAD_DIR",
            Self::ProcessedDir => "VIDHOOK_PROCESSED_DIR",
            Self::Ffmpeg => "VIDHOOK_FFMPEG",
            Self::Ffprobe => "VIDHOOK_FFPROBE",
            Self::MaxUploadMb => "VIDHOOK_MAX_UPLOAD_MB",
            Self::TranscodeTimeoutSecs => "VIDHOOK_TRANSCODE_TIMEOUT_SECS",
            Self::EnableScripts => "VIDHOOK_ENABLE_SCRIPTS",
            Self::ScriptShell => "VIDHOOK_SCRIPT_SHELL",
            Self::ScriptDir => "VIDHOOK_SCRIPT_DIR",
            Self::ScriptOutput => "VIDHOOK_SCRIPT_OUTPUT",
            Self::ScriptTimeoutSecs => "VIDHOOK_SCRIPT_TIMEOUT_SECS",
            Self::CleanupMaxAgeHours => "VIDHOOK_CLEANUP_MAX_AGE_HOURS",
            Self::CleanupIntervalSecs => "VIDHOOK_CLEANUP_INTERVAL_SECS",
            Self::LogFormat => "VIDHOOK_LOG_FORMAT",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub transcoder: TranscoderConfig,
    /// `None` when the script endpoint is disabled.
    pub scripts: Option<ScriptConfig>,
    pub max_upload_bytes: usize,
    pub cleanup_max_age: Duration,
    pub cleanup_interval: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        let script_defaults = ScriptConfig::default();

        let transcoder = TranscoderConfig {
            ffmpeg_path: env.path_or(EnvKey::Ffmpeg, "ffmpeg"),
            ffprobe_path: env.path_or(EnvKey::Ffprobe, "ffprobe"),
            upload_dir: env.path_or(EnvKey::UploadDir, "uploads"),
            processed_dir: env.path_or(EnvKey::ProcessedDir, "processed"),
            transcode_timeout: env
                .parsed::<u64>(EnvKey::TranscodeTimeoutSecs)?
                .map(Duration::from_secs),
        };

        let scripts_enabled = env.get(EnvKey::EnableScripts).is_none_or(|v| parse_flag(&v));
        let scripts = if scripts_enabled {
            Some(ScriptConfig {
                shell: env.path_or(EnvKey::ScriptShell, "bash"),
                script_dir: env
                    .get(EnvKey::ScriptDir)
                    .map(PathBuf::from)
                    .unwrap_or(script_defaults.script_dir),
                expected_output: env
                    .get(EnvKey::ScriptOutput)
                    .map(PathBuf::from)
                    .unwrap_or(script_defaults.expected_output),
                timeout: env
                    .parsed::<u64>(EnvKey::ScriptTimeoutSecs)?
                    .map(Duration::from_secs)
                    .unwrap_or(script_defaults.timeout),
            })
        } else {
            None
        };

        let log_format = match env.get(EnvKey::LogFormat).as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: EnvKey::LogFormat.as_str(),
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            bind_addr: env.get(EnvKey::Bind).unwrap_or_else(|| "0.0.0.0:5000".into()),
            transcoder,
            scripts,
            max_upload_bytes: env.parsed::<usize>(EnvKey::MaxUploadMb)?.unwrap_or(500) * 1024 * 1024,
            cleanup_max_age: Duration::from_secs(
                env.parsed::<u64>(EnvKey::CleanupMaxAgeHours)?.unwrap_or(24) * 3600,
            ),
            cleanup_interval: Duration::from_secs(
                env.parsed::<u64>(EnvKey::CleanupIntervalSecs)?.unwrap_or(3600),
            ),
            log_format,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: EnvKey) -> Option<String> {
        (self.0)(key.as_str()).filter(|v| !v.trim().is_empty())
    }

    fn path_or(&self, key: EnvKey, default: &str) -> PathBuf {
        self.get(key).unwrap_or_else(|| default.to_string()).into()
    }

    fn parsed<T: FromStr>(&self, key: EnvKey) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    key: key.as_str(),
                    value: raw,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:5000");
        assert_eq!(cfg.max_upload_bytes, 500 * 1024 * 1024);
        assert_eq!(cfg.transcoder.upload_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.transcoder.processed_dir, PathBuf::from("processed"));
        assert!(cfg.transcoder.transcode_timeout.is_none());
        assert_eq!(cfg.cleanup_max_age, Duration::from_secs(24 * 3600));
        assert_eq!(cfg.log_format, LogFormat::Text);

        let scripts = cfg.scripts.unwrap();
        assert_eq!(scripts.timeout, Duration::from_secs(600));
        assert_eq!(
            scripts.expected_output,
            PathBuf::from("/tmp/n8n/simple_video/final_output.mp4")
        );
    }

    #[test]
    fn overrides() {
        let cfg = config_from(&[
            ("VIDHOOK_BIND", "127.0.0.1:9000"),
            ("VIDHOOK_MAX_UPLOAD_MB", "10"),
            ("VIDHOOK_TRANSCODE_TIMEOUT_SECS", "120"),
            ("VIDHOOK_SCRIPT_TIMEOUT_SECS", "5"),
            ("VIDHOOK_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.transcoder.transcode_timeout, Some(Duration::from_secs(120)));
        assert_eq!(cfg.scripts.unwrap().timeout, Duration::from_secs(5));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn scripts_can_be_disabled() {
        let cfg = config_from(&[("VIDHOOK_ENABLE_SCRIPTS", "false")]).unwrap();
        assert!(cfg.scripts.is_none());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[("VIDHOOK_MAX_UPLOAD_MB", "lots")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "VIDHOOK_MAX_UPLOAD_MB has invalid value \"lots\""
        );
    }
}
