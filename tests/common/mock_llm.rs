//! Mock LLM Client for Testing
//!
//! Replies with a scripted result after an optional delay and counts calls.

use async_trait::async_trait;
use bhelper::config::BackendKind;
use bhelper::error::{BhError, BhResult};
use bhelper::llm::{LlmClient, TransformRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct MockLlm {
    reply: MockReply,
    delay: Duration,
    /// Calls that started
    pub calls: Arc<AtomicUsize>,
    /// Calls that ran to completion (were not dropped)
    pub completed: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<TransformRequest>>>,
}

impl MockLlm {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(MockReply::Text(text.to_string()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Status(status) => Err(BhError::Status {
                backend: "mock".to_string(),
                status: *status,
                body: String::new(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }
}
