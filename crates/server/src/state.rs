use std::sync::Arc;

use vidhook_transcoder::processor::VideoProcessor;
use vidhook_transcoder::script::ScriptRunner;

use crate::config::ServerConfig;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<VideoProcessor>,
    /// `None` when script execution is disabled.
    pub scripts: Option<Arc<ScriptRunner>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        let scripts = config.scripts.clone().map(|sc| {
            Arc::new(ScriptRunner::new(
                sc,
                config.transcoder.processed_dir.clone(),
            ))
        });

        Self {
            processor: Arc::new(VideoProcessor::new(config.transcoder.clone())),
            scripts,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
