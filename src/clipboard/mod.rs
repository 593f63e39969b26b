//! Text Capture/Injection
//!
//! The orchestrator reads the selection and writes results only through
//! [`TextAdapter`], so the desktop integration can be swapped freely.

use crate::error::BhResult;
use async_trait::async_trait;

pub mod shell;
pub mod stdio;

pub use shell::ShellClipboard;
pub use stdio::StdioAdapter;

/// Clipboard content saved before a transformation overwrites it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot(pub Option<String>);

impl ClipboardSnapshot {
    pub fn text(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Access to the selection, the clipboard and the focused window
#[async_trait]
pub trait TextAdapter: Send + Sync {
    /// Save the current clipboard content
    async fn snapshot(&self) -> BhResult<ClipboardSnapshot>;

    /// Copy the current selection and return it
    async fn capture_selection(&self) -> BhResult<Option<String>>;

    /// Put `text` on the clipboard and paste it into the focused window
    async fn inject_text(&self, text: &str) -> BhResult<()>;

    /// Put `text` on the clipboard without pasting
    async fn place_on_clipboard(&self, text: &str) -> BhResult<()>;

    /// Put a saved clipboard back; an empty snapshot clears the clipboard
    async fn restore(&self, snapshot: &ClipboardSnapshot) -> BhResult<()>;

    /// Identifier of the focused window, if it can be determined
    async fn focused_target(&self) -> Option<String>;
}
