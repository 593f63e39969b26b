//! Notification Module
//!
//! User-visible status and error messages. Delivery is fire-and-forget:
//! a notifier never reports failure back to the transformation flow.

use crate::config::Config;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub mod desktop;
pub mod log;

/// Title shown on every notification
pub const APP_TITLE: &str = "BHelper";

/// Trait for notification sinks
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a message to the user
    async fn notify(&self, message: &str);

    /// Get the notifier name
    fn name(&self) -> &str;
}

/// Factory to create the configured notifier
pub async fn create_notifier(config: &Config) -> Arc<dyn Notifier> {
    let notifier: Arc<dyn Notifier> = match config.notifier.as_str() {
        "desktop" => match desktop::DesktopNotifier::connect().await {
            Ok(n) => Arc::new(n),
            Err(e) => {
                warn!("⚠️ Desktop notifications unavailable, logging instead: {}", e);
                Arc::new(log::LogNotifier)
            }
        },
        "log" => Arc::new(log::LogNotifier),
        other => {
            warn!("  - Unknown notifier '{}', falling back to log", other);
            Arc::new(log::LogNotifier)
        }
    };
    info!("🔔 Notifier '{}' initialized", notifier.name());
    notifier
}
