use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vidhook_server::config::{LogFormat, ServerConfig};
use vidhook_server::state::AppState;
use vidhook_transcoder::tools::check_tool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    let app_state = AppState::from_config(&config);
    app_state
        .processor
        .ensure_dirs()
        .await
        .context("failed to create upload/processed directories")?;

    for tool in [&config.transcoder.ffmpeg_path, &config.transcoder.ffprobe_path] {
        let info = check_tool(tool).await;
        if info.available {
            info!(tool = ?tool, version = info.version.as_deref().unwrap_or("unknown"), "tool available");
        } else {
            warn!(tool = ?tool, "tool not found; video endpoints will fail");
        }
    }

    if let Some(scripts) = &config.scripts {
        warn!(
            shell = ?scripts.shell,
            timeout_secs = scripts.timeout.as_secs(),
            "script execution endpoint is enabled; it runs arbitrary shell code"
        );
    }

    // Spawn periodic cleanup of stale uploads and outputs
    {
        let processor = app_state.processor.clone();
        let max_age = config.cleanup_max_age;
        let interval = config.cleanup_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = processor.cleanup_old_files(max_age).await;
                if removed > 0 {
                    info!(removed, "cleanup pass complete");
                }
            }
        });
    }

    let app = vidhook_server::routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("failed to bind")?;
    info!(
        addr = %config.bind_addr,
        max_upload_mb = config.max_upload_bytes / (1024 * 1024),
        "server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
