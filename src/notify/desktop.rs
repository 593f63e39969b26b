//! Freedesktop notifications over D-Bus

use super::{Notifier, APP_TITLE};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use zbus::zvariant::Value;
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: &HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;
}

pub struct DesktopNotifier {
    proxy: NotificationsProxy<'static>,
}

impl std::fmt::Debug for DesktopNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopNotifier").finish()
    }
}

impl DesktopNotifier {
    pub async fn connect() -> Result<Self> {
        let connection = Connection::session().await?;
        let proxy = NotificationsProxy::new(&connection).await?;

        match proxy.get_server_information().await {
            Ok((name, vendor, version, _)) => {
                info!("🔔 Connected to notification server: {} {} ({})", name, version, vendor);
            }
            Err(e) => {
                return Err(anyhow::anyhow!("notification server not responding: {}", e));
            }
        }

        Ok(Self { proxy })
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, message: &str) {
        debug!("Notifying: {}", message);
        let hints = HashMap::new();
        if let Err(e) = self
            .proxy
            .notify(APP_TITLE, 0, "", APP_TITLE, message, &[], &hints, -1)
            .await
        {
            warn!("Error showing notification: {} ({})", e, message);
        }
    }

    fn name(&self) -> &str {
        "desktop"
    }
}
