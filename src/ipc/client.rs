//! IPC Client
//!
//! Unix socket client used by the one-shot CLI commands.

use anyhow::{bail, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{socket_path, IpcRequest, IpcResponse};
use crate::config::BackendKind;
use crate::llm::PromptMode;

static NEXT_SEQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_seq_id() -> u64 {
    NEXT_SEQ_ID.fetch_add(1, Ordering::SeqCst)
}

/// Daemon status as reported over IPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub in_flight: bool,
    pub backend: String,
    pub request_id: Option<String>,
    pub started_at: Option<String>,
}

/// IPC Client for the daemon socket
#[derive(Debug, Clone)]
pub struct IpcClient {
    path: PathBuf,
    timeout: Duration,
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new(socket_path())
    }
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Check if the daemon is running
    pub fn is_daemon_running(&self) -> bool {
        self.path.exists() && UnixStream::connect(&self.path).is_ok()
    }

    fn request(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.path)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let seq_id = request.seq_id();
        let request_json = serde_json::to_string(&request)? + "\n";
        stream.write_all(request_json.as_bytes())?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line)?;

        let response: IpcResponse = serde_json::from_str(line.trim())?;
        debug!("📨 IPC response: {:?}", response);

        if response.seq_id() != seq_id {
            bail!(
                "IPC sequence ID mismatch: expected {}, got {}",
                seq_id,
                response.seq_id()
            );
        }
        Ok(response)
    }

    fn expect_ack(&self, request: IpcRequest) -> Result<(bool, Option<String>)> {
        match self.request(request)? {
            IpcResponse::Ack {
                success, message, ..
            } => Ok((success, message)),
            other => bail!("Unexpected IPC response: {:?}", other),
        }
    }

    /// Ask the daemon to transform the current selection
    pub fn send_trigger(&self, mode: PromptMode) -> Result<(bool, Option<String>)> {
        self.expect_ack(IpcRequest::Trigger {
            seq_id: next_seq_id(),
            mode,
        })
    }

    /// Abort the running transformation
    pub fn send_cancel(&self) -> Result<(bool, Option<String>)> {
        self.expect_ack(IpcRequest::Cancel {
            seq_id: next_seq_id(),
        })
    }

    pub fn select_backend(&self, backend: BackendKind) -> Result<(bool, Option<String>)> {
        self.expect_ack(IpcRequest::SelectBackend {
            seq_id: next_seq_id(),
            backend,
        })
    }

    pub fn reload_config(&self) -> Result<(bool, Option<String>)> {
        self.expect_ack(IpcRequest::ReloadConfig {
            seq_id: next_seq_id(),
        })
    }

    /// Request daemon status
    pub fn get_status(&self) -> Result<DaemonStatus> {
        match self.request(IpcRequest::StatusRequest {
            seq_id: next_seq_id(),
        })? {
            IpcResponse::StatusResponse {
                in_flight,
                backend,
                request_id,
                started_at,
                ..
            } => Ok(DaemonStatus {
                in_flight,
                backend,
                request_id,
                started_at,
            }),
            other => bail!("Unexpected IPC response: {:?}", other),
        }
    }
}
