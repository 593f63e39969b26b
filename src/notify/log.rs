//! Notifier that writes to the log

use super::Notifier;
use async_trait::async_trait;
use tracing::warn;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        warn!("🔔 {}", message);
    }

    fn name(&self) -> &str {
        "log"
    }
}
