//! Mock Notifier for Testing
//!
//! Records every notification for verification.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn was_notified(&self, text: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(text))
    }
}

#[async_trait]
impl bhelper::notify::Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn name(&self) -> &str {
        "recording"
    }
}
