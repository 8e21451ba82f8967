//! Spoken announcements.

use async_trait::async_trait;
use tracing::info;

/// Speech output for operator-facing announcements.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn announce(&self, text: &str);
}

/// Writes announcements to the log instead of speaking them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogVoice;

#[async_trait]
impl VoiceSink for LogVoice {
    async fn announce(&self, text: &str) {
        info!(target: "dosa::voice", "{}", text);
    }
}
