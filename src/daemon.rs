//! Daemon
//!
//! Owns the configuration, the active client and the orchestrator, and turns
//! IPC requests into transformations.

use crate::clipboard::TextAdapter;
use crate::config::{BackendKind, Config};
use crate::ipc::{IpcRequest, IpcResponse, IpcServer};
use crate::llm::{create_client, LlmClient, PromptMode};
use crate::notify::Notifier;
use crate::orchestrator::{FlightState, Orchestrator};
use crate::store::StateStore;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long shutdown waits for a cancelled transformation to restore the clipboard
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Work the IPC thread hands to the async side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Trigger(PromptMode),
    SelectBackend(BackendKind),
    ReloadConfig,
}

pub struct Daemon {
    config: Config,
    config_path: PathBuf,
    store: Arc<StateStore>,
    notifier: Arc<dyn Notifier>,
    orchestrator: Arc<Orchestrator>,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Build the daemon around the configured backend
    ///
    /// A backend that cannot be built (missing key, bad URL) is reported and
    /// replaced by the local Ollama client so the daemon still starts.
    pub async fn new(
        config: Config,
        config_path: PathBuf,
        store: Arc<StateStore>,
        notifier: Arc<dyn Notifier>,
        adapter: Arc<dyn TextAdapter>,
    ) -> Result<Self> {
        let client = match create_client(&config.active_backend(), store.clone(), notifier.clone())
        {
            Ok(client) => client,
            Err(e) => {
                warn!("⚠️ {} unavailable: {}", config.selected_backend, e);
                notifier.notify(&e.user_message()).await;
                create_client(
                    &config.backend(BackendKind::Ollama),
                    store.clone(),
                    notifier.clone(),
                )?
            }
        };
        Ok(Self::with_client(
            config,
            config_path,
            store,
            notifier,
            adapter,
            client,
        ))
    }

    pub fn with_client(
        config: Config,
        config_path: PathBuf,
        store: Arc<StateStore>,
        notifier: Arc<dyn Notifier>,
        adapter: Arc<dyn TextAdapter>,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            client,
            adapter,
            notifier.clone(),
            config.transform_timeout(),
        ));
        Self {
            config,
            config_path,
            store,
            notifier,
            orchestrator,
            tasks: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    /// Request handler for the IPC server
    pub fn handler(
        &self,
        tx: mpsc::UnboundedSender<DaemonCommand>,
    ) -> impl Fn(IpcRequest) -> IpcResponse + Send + Sync + 'static {
        let orchestrator = self.orchestrator.clone();
        move |request| handle_request(&orchestrator, &tx, request)
    }

    /// Apply one command from the IPC side
    pub async fn apply(&mut self, command: DaemonCommand) {
        match command {
            DaemonCommand::Trigger(mode) => {
                let orchestrator = self.orchestrator.clone();
                self.tasks.retain(|task| !task.is_finished());
                self.tasks.push(tokio::spawn(async move {
                    orchestrator.trigger(mode).await;
                }));
            }
            DaemonCommand::SelectBackend(kind) => {
                if self.switch_backend(kind).await {
                    self.config.selected_backend = kind;
                    if let Err(e) = self.config.save_to(&self.config_path) {
                        warn!("⚠️ Failed to save backend selection: {}", e);
                    }
                }
            }
            DaemonCommand::ReloadConfig => match Config::load_from(&self.config_path) {
                Ok(config) => {
                    info!("📡 Configuration reloaded");
                    self.config = config;
                    let kind = self.config.selected_backend;
                    self.switch_backend(kind).await;
                }
                Err(e) => warn!("⚠️ Failed to reload configuration: {}", e),
            },
        }
    }

    async fn switch_backend(&self, kind: BackendKind) -> bool {
        match create_client(
            &self.config.backend(kind),
            self.store.clone(),
            self.notifier.clone(),
        ) {
            Ok(client) => {
                self.orchestrator.set_client(client);
                true
            }
            Err(e) => {
                warn!("⚠️ Cannot switch to {}: {}", kind, e);
                self.notifier.notify(&e.user_message()).await;
                false
            }
        }
    }

    /// Serve IPC requests until Ctrl-C
    pub async fn run(mut self, mut server: IpcServer) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        server.start(self.handler(tx))?;
        info!(
            "✅ BHelper ready on {:?} using {}",
            server.path(),
            self.orchestrator.client_name()
        );

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.apply(command).await,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("👋 Shutting down");
                    break;
                }
            }
        }

        server.stop();
        self.shutdown().await;
        Ok(())
    }

    /// Cancel the running transformation and wait for its cleanup
    pub async fn shutdown(&mut self) {
        self.orchestrator.cancel();
        let tasks = std::mem::take(&mut self.tasks);
        let drain = async {
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("⚠️ Transformation task failed: {}", e);
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("⚠️ Transformation did not finish within {:?}", SHUTDOWN_GRACE);
        }
    }
}

fn handle_request(
    orchestrator: &Orchestrator,
    tx: &mpsc::UnboundedSender<DaemonCommand>,
    request: IpcRequest,
) -> IpcResponse {
    let forward = |seq_id: u64, command: DaemonCommand, message: String| {
        if tx.send(command).is_err() {
            return IpcResponse::ack(seq_id, false, "Daemon is shutting down");
        }
        IpcResponse::ack(seq_id, true, message)
    };

    match request {
        IpcRequest::Trigger { seq_id, mode } => {
            info!("📡 IPC trigger ({:?})", mode);
            let busy = !orchestrator.state().is_idle();
            let response = forward(seq_id, DaemonCommand::Trigger(mode), "Triggered".into());
            if busy {
                // The orchestrator itself rejects and notifies; only the ack differs
                return IpcResponse::ack(seq_id, false, "Busy");
            }
            response
        }
        IpcRequest::StatusRequest { seq_id } => {
            let (request_id, started_at) = match orchestrator.state() {
                FlightState::Idle => (None, None),
                FlightState::InFlight {
                    request_id,
                    started_at,
                    ..
                } => (Some(request_id.to_string()), Some(started_at.to_rfc3339())),
            };
            IpcResponse::StatusResponse {
                seq_id,
                in_flight: request_id.is_some(),
                backend: orchestrator.client_name(),
                request_id,
                started_at,
            }
        }
        IpcRequest::Cancel { seq_id } => {
            if orchestrator.cancel() {
                IpcResponse::ack(seq_id, true, "Cancelled")
            } else {
                IpcResponse::ack(seq_id, false, "Nothing to cancel")
            }
        }
        IpcRequest::SelectBackend { seq_id, backend } => forward(
            seq_id,
            DaemonCommand::SelectBackend(backend),
            format!("Switching to {backend}"),
        ),
        IpcRequest::ReloadConfig { seq_id } => forward(
            seq_id,
            DaemonCommand::ReloadConfig,
            "Reloading config".into(),
        ),
    }
}
