//! IPC (Inter-Process Communication) Module
//!
//! Unix socket between the `bhelper run` daemon and the short-lived
//! `bhelper trigger|status|cancel|select` commands. Desktop shortcuts call
//! those commands, which makes this the trigger delivery channel.
//! Protocol: JSON over newline-delimited messages.

pub mod client;
pub mod messages;
pub mod server;

pub use client::IpcClient;
pub use messages::*;
pub use server::IpcServer;

use std::path::PathBuf;

/// Get the Unix socket path for IPC
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("BHELPER_SOCKET") {
        return PathBuf::from(path);
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "bhelper".to_string());
    PathBuf::from(format!("/tmp/bhelper-{}.sock", user))
}
