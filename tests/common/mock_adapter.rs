//! Mock Text Adapter for Testing
//!
//! An in-memory clipboard. Capturing the selection copies it onto the
//! clipboard, like the real copy keystroke does.

use async_trait::async_trait;
use bhelper::clipboard::{ClipboardSnapshot, TextAdapter};
use bhelper::error::BhResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct MockAdapter {
    pub clipboard: Arc<Mutex<Option<String>>>,
    pub selection: Arc<Mutex<Option<String>>>,
    pub injected: Arc<Mutex<Vec<String>>>,
    /// Focus answers consumed in order; the last one repeats
    pub focus: Arc<Mutex<VecDeque<String>>>,
    /// Time the clipboard read takes after the copy keystroke
    pub capture_delay: Arc<Mutex<Duration>>,
}

impl MockAdapter {
    pub fn new(clipboard: Option<&str>, selection: Option<&str>) -> Self {
        let adapter = Self::default();
        *adapter.clipboard.lock().unwrap() = clipboard.map(str::to_string);
        *adapter.selection.lock().unwrap() = selection.map(str::to_string);
        adapter.focus.lock().unwrap().push_back("editor".to_string());
        adapter
    }

    /// Script the focused window answers
    pub fn with_focus(self, targets: &[&str]) -> Self {
        {
            let mut focus = self.focus.lock().unwrap();
            focus.clear();
            focus.extend(targets.iter().map(|t| t.to_string()));
        }
        self
    }

    /// Make capture stall after the selection has reached the clipboard
    pub fn with_capture_delay(self, delay: Duration) -> Self {
        *self.capture_delay.lock().unwrap() = delay;
        self
    }

    pub fn clipboard(&self) -> Option<String> {
        self.clipboard.lock().unwrap().clone()
    }

    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextAdapter for MockAdapter {
    async fn snapshot(&self) -> BhResult<ClipboardSnapshot> {
        Ok(ClipboardSnapshot(self.clipboard()))
    }

    async fn capture_selection(&self) -> BhResult<Option<String>> {
        let selection = self.selection.lock().unwrap().clone();
        if let Some(text) = &selection {
            *self.clipboard.lock().unwrap() = Some(text.clone());
        }
        let delay = *self.capture_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(selection)
    }

    async fn inject_text(&self, text: &str) -> BhResult<()> {
        *self.clipboard.lock().unwrap() = Some(text.to_string());
        self.injected.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn place_on_clipboard(&self, text: &str) -> BhResult<()> {
        *self.clipboard.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    async fn restore(&self, snapshot: &ClipboardSnapshot) -> BhResult<()> {
        *self.clipboard.lock().unwrap() = snapshot.0.clone();
        Ok(())
    }

    async fn focused_target(&self) -> Option<String> {
        let mut focus = self.focus.lock().unwrap();
        if focus.len() > 1 {
            focus.pop_front()
        } else {
            focus.front().cloned()
        }
    }
}
