//! Selection from stdin, result to stdout
//!
//! Used by `bhelper transform` so the rewrite pipeline can run in a shell
//! pipe without a desktop session.

use super::{ClipboardSnapshot, TextAdapter};
use crate::error::BhResult;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Default, Clone, Copy)]
pub struct StdioAdapter;

impl StdioAdapter {
    async fn print(text: &str) -> BhResult<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TextAdapter for StdioAdapter {
    async fn snapshot(&self) -> BhResult<ClipboardSnapshot> {
        Ok(ClipboardSnapshot(None))
    }

    async fn capture_selection(&self) -> BhResult<Option<String>> {
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        let input = input.trim_end_matches(['\r', '\n']).to_string();
        Ok(Some(input).filter(|s| !s.trim().is_empty()))
    }

    async fn inject_text(&self, text: &str) -> BhResult<()> {
        Self::print(text).await
    }

    async fn place_on_clipboard(&self, text: &str) -> BhResult<()> {
        Self::print(text).await
    }

    async fn restore(&self, _snapshot: &ClipboardSnapshot) -> BhResult<()> {
        Ok(())
    }

    async fn focused_target(&self) -> Option<String> {
        Some("stdout".to_string())
    }
}
