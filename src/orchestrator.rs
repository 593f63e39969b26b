//! Transformation Orchestrator
//!
//! Runs one capture → rewrite → inject cycle at a time. Every phase up to the
//! LLM reply is raced against one deadline and a cancel signal; the losing
//! future is dropped, which aborts the HTTP request, so a late reply can
//! never reach the clipboard.

use crate::clipboard::{ClipboardSnapshot, TextAdapter};
use crate::error::{BhError, BhResult};
use crate::llm::{LlmClient, PromptMode, TransformRequest};
use crate::notify::Notifier;
use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BUSY_MESSAGE: &str = "A previous transformation is still in progress. Please wait.";
pub const TIMEOUT_MESSAGE: &str = "Transformation timed out. Please try again.";
pub const CLIPBOARD_MESSAGE: &str =
    "Transformed text is ready in your clipboard. Paste it using (Ctrl + V)";

/// Whether a transformation is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightState {
    Idle,
    InFlight {
        request_id: Uuid,
        started_at: DateTime<Local>,
        mode: PromptMode,
    },
}

impl FlightState {
    pub fn is_idle(&self) -> bool {
        matches!(self, FlightState::Idle)
    }
}

/// How a trigger ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Result pasted into the window that was focused at trigger time
    Pasted(String),
    /// Focus moved away; result left on the clipboard
    CopiedToClipboard(String),
    /// Another transformation was running; nothing was sent
    Busy,
    /// The selection was empty
    NothingSelected,
    /// Client failed or returned nothing; clipboard restored
    Failed,
    /// Timeout fired before the client answered; clipboard restored
    TimedOut,
    /// Cancelled through [`Orchestrator::cancel`]; clipboard restored
    Cancelled,
}

/// Why a phase stopped before finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    TimedOut,
    Cancelled,
}

/// Upper bound for restoring the clipboard and delivering a result
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Run `work` unless the deadline passes or a cancel arrives first
///
/// Losing futures are dropped, which kills child processes and aborts
/// HTTP requests.
async fn bounded<F: Future>(
    work: F,
    deadline: Instant,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<F::Output, Interrupt> {
    tokio::select! {
        output = work => Ok(output),
        _ = tokio::time::sleep_until(deadline) => Err(Interrupt::TimedOut),
        _ = cancel_rx => Err(Interrupt::Cancelled),
    }
}

/// Resets the flight state when a run ends, however it ends
struct FlightGuard<'a> {
    orchestrator: &'a Orchestrator,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.orchestrator.state.lock() {
            *state = FlightState::Idle;
        }
        if let Ok(mut cancel) = self.orchestrator.cancel_tx.lock() {
            cancel.take();
        }
    }
}

pub struct Orchestrator {
    client: RwLock<Arc<dyn LlmClient>>,
    adapter: Arc<dyn TextAdapter>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    state: Mutex<FlightState>,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        adapter: Arc<dyn TextAdapter>,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: RwLock::new(client),
            adapter,
            notifier,
            timeout,
            state: Mutex::new(FlightState::Idle),
            cancel_tx: Mutex::new(None),
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(FlightState::Idle)
    }

    /// Swap the backend; a running transformation keeps its client
    pub fn set_client(&self, client: Arc<dyn LlmClient>) {
        if let Ok(mut current) = self.client.write() {
            info!("🔀 Switched LLM client to {}", client.name());
            *current = client;
        }
    }

    pub fn client_name(&self) -> String {
        self.client
            .read()
            .map(|c| c.name().to_string())
            .unwrap_or_default()
    }

    fn current_client(&self) -> Option<Arc<dyn LlmClient>> {
        self.client.read().ok().map(|c| c.clone())
    }

    /// Abort the running transformation, if any
    pub fn cancel(&self) -> bool {
        let sender = self.cancel_tx.lock().ok().and_then(|mut tx| tx.take());
        match sender {
            Some(tx) => {
                info!("🛑 Cancelling transformation");
                tx.send(()).is_ok()
            }
            None => false,
        }
    }

    /// Claim the single flight slot; `None` when already taken
    fn begin(&self, mode: PromptMode) -> Option<(Uuid, oneshot::Receiver<()>)> {
        let mut state = self.state.lock().ok()?;
        if !state.is_idle() {
            return None;
        }
        let request_id = Uuid::new_v4();
        *state = FlightState::InFlight {
            request_id,
            started_at: Local::now(),
            mode,
        };
        let (tx, rx) = oneshot::channel();
        if let Ok(mut cancel) = self.cancel_tx.lock() {
            *cancel = Some(tx);
        }
        Some((request_id, rx))
    }

    /// Run one transformation of the current selection
    ///
    /// The timeout covers the whole cycle from the trigger on, capture
    /// included.
    pub async fn trigger(&self, mode: PromptMode) -> TransformOutcome {
        let Some((request_id, cancel_rx)) = self.begin(mode) else {
            warn!("⏳ Transformation already in progress, rejecting trigger");
            self.notifier.notify(BUSY_MESSAGE).await;
            return TransformOutcome::Busy;
        };
        let _guard = FlightGuard { orchestrator: self };
        info!("✏️ Transformation {} started ({:?})", request_id, mode);

        let deadline = Instant::now() + self.timeout;
        let outcome = self.run(mode, deadline, cancel_rx).await;
        info!("🏁 Transformation {} finished: {}", request_id, outcome_label(&outcome));
        outcome
    }

    async fn run(
        &self,
        mode: PromptMode,
        deadline: Instant,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> TransformOutcome {
        let Some(client) = self.current_client() else {
            return TransformOutcome::Failed;
        };

        let focused = bounded(self.adapter.focused_target(), deadline, &mut cancel_rx).await;
        let target = match focused {
            Ok(target) => target,
            Err(interrupt) => return self.interrupted(interrupt, None, None).await,
        };

        let snapshot = match bounded(self.adapter.snapshot(), deadline, &mut cancel_rx).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!("⚠️ Could not snapshot clipboard: {}", e);
                ClipboardSnapshot::default()
            }
            Err(interrupt) => return self.interrupted(interrupt, target.as_deref(), None).await,
        };

        let captured = bounded(self.adapter.capture_selection(), deadline, &mut cancel_rx).await;
        let text = match captured {
            Ok(Ok(Some(text))) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                debug!("Nothing selected");
                self.restore(&snapshot).await;
                return TransformOutcome::NothingSelected;
            }
            Ok(Err(e)) => {
                warn!("❌ Could not capture selection: {}", e);
                self.notifier.notify(&e.user_message()).await;
                self.restore(&snapshot).await;
                return TransformOutcome::Failed;
            }
            Err(interrupt) => {
                return self
                    .interrupted(interrupt, target.as_deref(), Some(&snapshot))
                    .await
            }
        };

        let request = TransformRequest::new(text, mode);
        match bounded(client.send_text(&request), deadline, &mut cancel_rx).await {
            Ok(Ok(result)) if !result.trim().is_empty() => {
                self.deliver(result, target.as_deref()).await
            }
            Ok(Ok(_)) => {
                warn!("⚠️ {} returned an empty result", client.name());
                self.restore(&snapshot).await;
                TransformOutcome::Failed
            }
            Ok(Err(e)) => {
                warn!("❌ {} failed: {}", client.name(), e);
                self.notifier.notify(&e.user_message()).await;
                self.restore(&snapshot).await;
                TransformOutcome::Failed
            }
            Err(interrupt) => {
                self.interrupted(interrupt, target.as_deref(), Some(&snapshot))
                    .await
            }
        }
    }

    /// Undo a cycle stopped by the timeout or a cancel
    async fn interrupted(
        &self,
        interrupt: Interrupt,
        target: Option<&str>,
        snapshot: Option<&ClipboardSnapshot>,
    ) -> TransformOutcome {
        if let Some(snapshot) = snapshot {
            self.restore(snapshot).await;
        }
        match interrupt {
            Interrupt::Cancelled => TransformOutcome::Cancelled,
            Interrupt::TimedOut => {
                warn!("⌛ Transformation timed out after {:?}", self.timeout);
                // An unanswered focus query counts as unchanged focus
                let still_focused =
                    tokio::time::timeout(CLEANUP_TIMEOUT, self.adapter.focused_target())
                        .await
                        .map(|focused| focused.as_deref() == target)
                        .unwrap_or(true);
                if still_focused {
                    self.notifier.notify(TIMEOUT_MESSAGE).await;
                }
                TransformOutcome::TimedOut
            }
        }
    }

    async fn deliver(&self, result: String, target: Option<&str>) -> TransformOutcome {
        let focused = tokio::time::timeout(CLEANUP_TIMEOUT, self.adapter.focused_target())
            .await
            .ok()
            .flatten();
        if focused.as_deref() == target {
            match cleanup("paste", self.adapter.inject_text(&result)).await {
                Ok(()) => return TransformOutcome::Pasted(result),
                Err(e) => warn!("⚠️ Paste failed, leaving result on clipboard: {}", e),
            }
        }

        if let Err(e) = cleanup("clipboard write", self.adapter.place_on_clipboard(&result)).await {
            warn!("❌ Could not place result on clipboard: {}", e);
            self.notifier.notify(&e.user_message()).await;
            return TransformOutcome::Failed;
        }
        self.notifier.notify(CLIPBOARD_MESSAGE).await;
        TransformOutcome::CopiedToClipboard(result)
    }

    async fn restore(&self, snapshot: &ClipboardSnapshot) {
        if let Err(e) = cleanup("clipboard restore", self.adapter.restore(snapshot)).await {
            warn!("⚠️ Could not restore clipboard: {}", e);
        }
    }
}

/// Bound a clipboard step that runs after the deadline may have passed
async fn cleanup<F>(step: &str, work: F) -> BhResult<()>
where
    F: Future<Output = BhResult<()>>,
{
    tokio::time::timeout(CLEANUP_TIMEOUT, work)
        .await
        .unwrap_or_else(|_| Err(BhError::Clipboard(format!("{step} timed out"))))
}

fn outcome_label(outcome: &TransformOutcome) -> &'static str {
    match outcome {
        TransformOutcome::Pasted(_) => "pasted",
        TransformOutcome::CopiedToClipboard(_) => "copied",
        TransformOutcome::Busy => "busy",
        TransformOutcome::NothingSelected => "nothing selected",
        TransformOutcome::Failed => "failed",
        TransformOutcome::TimedOut => "timed out",
        TransformOutcome::Cancelled => "cancelled",
    }
}
