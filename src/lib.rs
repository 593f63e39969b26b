//! BHelper Library
//!
//! Core modules for the BHelper text rewriting helper.

pub mod clipboard;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod llm;
pub mod notify;
pub mod orchestrator;
pub mod store;
