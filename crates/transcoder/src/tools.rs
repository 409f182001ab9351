//! External tool availability checks.
//!
//! Runs `<tool> -version` and reads the first line of its output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::{error, info};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing for an external binary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInfo {
    pub available: bool,
    pub version: Option<String>,
}

/// Check whether a tool answers `-version` with exit status 0 within five seconds.
pub async fn check_tool(path: &Path) -> ToolInfo {
    match version_line(path).await {
        Ok(version) => ToolInfo {
            available: true,
            version,
        },
        Err(e) => {
            error!(tool = ?path, error = %e, "tool not available");
            ToolInfo {
                available: false,
                version: None,
            }
        }
    }
}

pub async fn ffmpeg_available(ffmpeg_path: &Path) -> bool {
    check_tool(ffmpeg_path).await.available
}

async fn version_line(path: &Path) -> Result<Option<String>, String> {
    let run = tokio::process::Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(VERSION_CHECK_TIMEOUT, run)
        .await
        .map_err(|_| format!("timed out after {}s", VERSION_CHECK_TIMEOUT.as_secs()))?
        .map_err(|e| format!("spawn: {e}"))?;

    if !output.status.success() {
        return Err(format!("-version exited with {}", output.status));
    }

    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string());
    info!(tool = ?path, ?version, "tool detected");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let info = check_tool(Path::new("nonexistent_tool_12345")).await;
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(!ffmpeg_available(Path::new("nonexistent_tool_12345")).await);
    }
}
