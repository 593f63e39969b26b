//! IPC Message Types
//!
//! JSON-serializable messages for daemon ↔ command communication.

use crate::config::BackendKind;
use crate::llm::PromptMode;
use serde::{Deserialize, Serialize};

/// Request types sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcRequest {
    /// Transform the current selection
    #[serde(rename = "trigger")]
    Trigger { seq_id: u64, mode: PromptMode },

    /// Request status of the daemon
    #[serde(rename = "status_request")]
    StatusRequest { seq_id: u64 },

    /// Abort the running transformation
    #[serde(rename = "cancel")]
    Cancel { seq_id: u64 },

    /// Switch the active backend
    #[serde(rename = "select_backend")]
    SelectBackend { seq_id: u64, backend: BackendKind },

    /// Reload configuration
    #[serde(rename = "reload_config")]
    ReloadConfig { seq_id: u64 },
}

impl IpcRequest {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcRequest::Trigger { seq_id, .. }
            | IpcRequest::StatusRequest { seq_id }
            | IpcRequest::Cancel { seq_id }
            | IpcRequest::SelectBackend { seq_id, .. }
            | IpcRequest::ReloadConfig { seq_id } => *seq_id,
        }
    }
}

/// Response types sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Status response
    #[serde(rename = "status_response")]
    StatusResponse {
        seq_id: u64,
        in_flight: bool,
        backend: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        /// RFC 3339 time the running transformation was triggered
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<String>,
    },

    /// Acknowledgment
    #[serde(rename = "ack")]
    Ack {
        seq_id: u64,
        success: bool,
        message: Option<String>,
    },
}

impl IpcResponse {
    pub fn seq_id(&self) -> u64 {
        match self {
            IpcResponse::StatusResponse { seq_id, .. } | IpcResponse::Ack { seq_id, .. } => {
                *seq_id
            }
        }
    }

    pub fn ack(seq_id: u64, success: bool, message: impl Into<String>) -> Self {
        IpcResponse::Ack {
            seq_id,
            success,
            message: Some(message.into()),
        }
    }
}
