//! Clipboard access through external commands
//!
//! Defaults target X11 (`xclip`, `xdotool`); Wayland users can point the
//! config at `wl-paste`, `wl-copy` and `wtype`.

use super::{ClipboardSnapshot, TextAdapter};
use crate::config::ClipboardConfig;
use crate::error::{BhError, BhResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ShellClipboard {
    config: ClipboardConfig,
}

impl ShellClipboard {
    pub fn new(config: &ClipboardConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn command(argv: &[String]) -> BhResult<Command> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| BhError::Clipboard("command not configured".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        Ok(cmd)
    }

    /// Run a command and return its stdout
    async fn run(argv: &[String]) -> BhResult<String> {
        let output = Self::command(argv)?
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BhError::Clipboard(format!("{}: {}", argv.join(" "), e)))?;

        if !output.status.success() {
            return Err(BhError::Clipboard(format!(
                "{} exited with {}: {}",
                argv.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn read_clipboard(&self) -> Option<String> {
        match Self::run(&self.config.read_command).await {
            Ok(text) => Some(text),
            Err(e) => {
                // xclip exits non-zero when the clipboard is empty
                debug!("Clipboard read failed: {}", e);
                None
            }
        }
    }

    async fn write_clipboard(&self, text: &str) -> BhResult<()> {
        let argv = &self.config.write_command;
        let mut child = Self::command(argv)?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| BhError::Clipboard(format!("{}: {}", argv.join(" "), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(BhError::Clipboard(format!(
                "{} exited with {}",
                argv.join(" "),
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TextAdapter for ShellClipboard {
    async fn snapshot(&self) -> BhResult<ClipboardSnapshot> {
        Ok(ClipboardSnapshot(self.read_clipboard().await))
    }

    async fn capture_selection(&self) -> BhResult<Option<String>> {
        Self::run(&self.config.copy_keys_command).await?;
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        Ok(self.read_clipboard().await.filter(|t| !t.is_empty()))
    }

    async fn inject_text(&self, text: &str) -> BhResult<()> {
        self.write_clipboard(text).await?;
        Self::run(&self.config.paste_keys_command).await?;
        Ok(())
    }

    async fn place_on_clipboard(&self, text: &str) -> BhResult<()> {
        self.write_clipboard(text).await
    }

    async fn restore(&self, snapshot: &ClipboardSnapshot) -> BhResult<()> {
        self.write_clipboard(snapshot.text().unwrap_or("")).await
    }

    async fn focused_target(&self) -> Option<String> {
        if self.config.focus_command.is_empty() {
            return None;
        }
        match Self::run(&self.config.focus_command).await {
            Ok(id) => Some(id.trim().to_string()).filter(|id| !id.is_empty()),
            Err(e) => {
                warn!("⚠️ Could not determine focused window: {}", e);
                None
            }
        }
    }
}
