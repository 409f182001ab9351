//! Caller-supplied shell script execution.
//!
//! The script body is run verbatim by the configured shell with no
//! sandboxing. Its only contract is to leave a video at `expected_output`.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tracing::{info, warn};

use crate::TranscodeError;

#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub shell: PathBuf,
    /// Where the temporary `script_<job>.sh` files are written.
    pub script_dir: PathBuf,
    /// Fixed path the script is expected to produce.
    pub expected_output: PathBuf,
    pub timeout: Duration,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("bash"),
            script_dir: PathBuf::from("/tmp"),
            expected_output: PathBuf::from("/tmp/n8n/simple_video/final_output.mp4"),
            timeout: Duration::from_secs(600),
        }
    }
}

/// A video produced by a script and copied into the processed directory.
#[derive(Debug, Clone)]
pub struct ScriptArtifact {
    pub job_id: String,
    pub stdout: String,
    pub video_path: PathBuf,
    pub processed_file: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub enum ScriptOutcome {
    Completed(ScriptArtifact),
    Failed {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NoOutput {
        stdout: String,
        stderr: String,
    },
    TimedOut {
        after: Duration,
    },
}

pub struct ScriptRunner {
    config: ScriptConfig,
    processed_dir: PathBuf,
}

impl ScriptRunner {
    pub fn new(config: ScriptConfig, processed_dir: PathBuf) -> Self {
        Self {
            config,
            processed_dir,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Write `script` to a temp file, run it, and collect its video.
    ///
    /// The temp file is removed on every exit path; the shell is killed if
    /// the timeout elapses.
    pub async fn run(&self, script: &str) -> Result<ScriptOutcome, TranscodeError> {
        let job_id = uuid::Uuid::new_v4().to_string();

        let mut file = tempfile::Builder::new()
            .prefix(&format!("script_{job_id}"))
            .suffix(".sh")
            .tempfile_in(&self.config.script_dir)?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        make_executable(file.path())?;
        let script_path = file.into_temp_path();

        warn!(job_id = %job_id, bytes = script.len(), "executing caller-supplied script");

        let child = tokio::process::Command::new(&self.config.shell)
            .arg(&*script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_) => {
                warn!(job_id = %job_id, timeout_secs = self.config.timeout.as_secs(), "script timed out");
                return Ok(ScriptOutcome::TimedOut {
                    after: self.config.timeout,
                });
            }
        };

        if let Err(e) = script_path.close() {
            warn!(job_id = %job_id, error = %e, "failed to remove script file");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let code = exit_code(&output.status);
            info!(job_id = %job_id, code, "script failed");
            return Ok(ScriptOutcome::Failed {
                code,
                stdout,
                stderr,
            });
        }

        if !tokio::fs::try_exists(&self.config.expected_output)
            .await
            .unwrap_or(false)
        {
            info!(job_id = %job_id, expected = ?self.config.expected_output, "script produced no video");
            return Ok(ScriptOutcome::NoOutput { stdout, stderr });
        }

        let processed_file = format!("video_{job_id}.mp4");
        let dest = self.processed_dir.join(&processed_file);
        let size_bytes = tokio::fs::copy(&self.config.expected_output, &dest).await?;

        info!(job_id = %job_id, file = %processed_file, size_bytes, "script video collected");

        Ok(ScriptOutcome::Completed(ScriptArtifact {
            job_id,
            stdout,
            video_path: self.config.expected_output.clone(),
            processed_file,
            size_bytes,
        }))
    }
}

/// Exit code, or the negated signal number for a killed process.
#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    struct Fixture {
        root: tempfile::TempDir,
        runner: ScriptRunner,
    }

    impl Fixture {
        fn new(timeout: Duration) -> Self {
            let root = tempfile::tempdir().unwrap();
            for dir in ["scripts", "processed", "out"] {
                std::fs::create_dir_all(root.path().join(dir)).unwrap();
            }
            let runner = ScriptRunner::new(
                ScriptConfig {
                    shell: PathBuf::from("bash"),
                    script_dir: root.path().join("scripts"),
                    expected_output: root.path().join("out/final_output.mp4"),
                    timeout,
                },
                root.path().join("processed"),
            );
            Self { root, runner }
        }

        fn expected(&self) -> String {
            self.runner.config().expected_output.display().to_string()
        }

        fn scripts_left(&self) -> usize {
            std::fs::read_dir(self.root.path().join("scripts"))
                .unwrap()
                .count()
        }
    }

    #[tokio::test]
    async fn collects_produced_video() {
        let fx = Fixture::new(Duration::from_secs(30));
        let script = format!("echo rendering\nprintf '0123456789' > '{}'\n", fx.expected());

        let outcome = fx.runner.run(&script).await.unwrap();
        let artifact = match outcome {
            ScriptOutcome::Completed(artifact) => artifact,
            other => panic!("expected completion, got {other:?}"),
        };

        assert_eq!(artifact.stdout, "rendering\n");
        assert_eq!(artifact.size_bytes, 10);
        assert_eq!(artifact.processed_file, format!("video_{}.mp4", artifact.job_id));
        assert!(
            fx.root
                .path()
                .join("processed")
                .join(&artifact.processed_file)
                .exists()
        );
        assert_eq!(fx.scripts_left(), 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let fx = Fixture::new(Duration::from_secs(30));
        let outcome = fx
            .runner
            .run("echo out; echo err >&2; exit 3")
            .await
            .unwrap();

        match outcome {
            ScriptOutcome::Failed {
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(code, 3);
                assert_eq!(stdout, "out\n");
                assert_eq!(stderr, "err\n");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fx.scripts_left(), 0);
    }

    #[test]
    fn default_script_dir_is_tmp() {
        assert_eq!(ScriptConfig::default().script_dir, PathBuf::from("/tmp"));
    }

    #[tokio::test]
    async fn killed_script_reports_negated_signal() {
        let fx = Fixture::new(Duration::from_secs(30));
        let outcome = fx.runner.run("kill -9 $$").await.unwrap();
        match outcome {
            ScriptOutcome::Failed { code, .. } => assert_eq!(code, -9),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(fx.scripts_left(), 0);
    }

    #[tokio::test]
    async fn success_without_video_is_no_output() {
        let fx = Fixture::new(Duration::from_secs(30));
        let outcome = fx.runner.run("echo done").await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::NoOutput { .. }));
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let fx = Fixture::new(Duration::from_millis(300));
        let outcome = fx.runner.run("sleep 5").await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::TimedOut { .. }));
        assert_eq!(fx.scripts_left(), 0);
    }
}
