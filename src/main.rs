//! BHelper - rewrite the selected text with an LLM
//!
//! `bhelper run` starts the daemon; desktop shortcuts bound to
//! `bhelper trigger` and `bhelper trigger --prompt` start transformations.

use anyhow::{bail, Result};
use bhelper::clipboard::{ShellClipboard, StdioAdapter};
use bhelper::config::{config_path, BackendKind, Config};
use bhelper::daemon::Daemon;
use bhelper::ipc::{IpcClient, IpcServer};
use bhelper::llm::gateway::GatewayClient;
use bhelper::llm::{create_client, PromptMode};
use bhelper::notify::{create_notifier, log::LogNotifier, Notifier};
use bhelper::orchestrator::{Orchestrator, TransformOutcome};
use bhelper::store::StateStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon that performs transformations
    Run,
    /// Transform the current selection in the running daemon
    Trigger {
        /// Send the selection as a free-form prompt instead of rewriting it
        #[arg(long)]
        prompt: bool,
    },
    /// Show daemon status
    Status,
    /// Cancel the running transformation
    Cancel,
    /// Select the LLM backend
    Select { backend: BackendKind },
    /// Rewrite text from stdin and print the result
    Transform {
        #[arg(long)]
        prompt: bool,
        /// Override the selected backend for this run
        #[arg(long)]
        backend: Option<BackendKind>,
    },
    /// Sign in to the enterprise gateway and store the ticket
    SignIn,
    /// Print the configuration
    Config,
}

fn mode(prompt: bool) -> PromptMode {
    if prompt {
        PromptMode::Direct
    } else {
        PromptMode::Prefixed
    }
}

fn init_logging(verbose: bool, config: &Config) {
    let fallback = if verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_ack((success, message): (bool, Option<String>)) -> Result<()> {
    let message = message.unwrap_or_default();
    if !success {
        bail!("{}", message);
    }
    println!("{}", message);
    Ok(())
}

/// Copy of the config with secrets blanked out
fn redacted(config: &Config) -> Config {
    let mask = |s: &mut String| {
        if !s.is_empty() {
            *s = "********".to_string();
        }
    };
    let mut c = config.clone();
    mask(&mut c.backends.gateway.app_secret);
    mask(&mut c.backends.gateway.password);
    mask(&mut c.backends.openai.api_key);
    mask(&mut c.backends.claude.api_key);
    mask(&mut c.backends.gemini.api_key);
    c
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let path = args.config.clone().unwrap_or_else(config_path);
    let config = Config::load_from(&path)?;
    init_logging(args.verbose, &config);

    match args.command {
        Command::Run => {
            let ipc = IpcClient::default();
            if ipc.is_daemon_running() {
                bail!("BHelper is already running");
            }
            info!("✏️ BHelper v{} starting...", env!("CARGO_PKG_VERSION"));

            let store = Arc::new(StateStore::open_default()?);
            let notifier = create_notifier(&config).await;
            let adapter = Arc::new(ShellClipboard::new(&config.clipboard));
            let daemon = Daemon::new(config, path, store, notifier, adapter).await?;
            daemon.run(IpcServer::new()).await
        }
        Command::Trigger { prompt } => print_ack(IpcClient::default().send_trigger(mode(prompt))?),
        Command::Status => {
            let status = IpcClient::default().get_status()?;
            println!("backend:   {}", status.backend);
            match (status.request_id, status.started_at) {
                (Some(id), Some(started)) => {
                    println!("state:     in flight ({}) since {}", id, started)
                }
                (Some(id), None) => println!("state:     in flight ({})", id),
                _ => println!("state:     idle"),
            }
            Ok(())
        }
        Command::Cancel => print_ack(IpcClient::default().send_cancel()?),
        Command::Select { backend } => {
            let ipc = IpcClient::default();
            if ipc.is_daemon_running() {
                return print_ack(ipc.select_backend(backend)?);
            }
            let store = Arc::new(StateStore::open_default()?);
            create_client(&config.backend(backend), store, Arc::new(LogNotifier))?;
            let mut config = config;
            config.selected_backend = backend;
            config.save_to(&path)?;
            println!("Selected {}", backend);
            Ok(())
        }
        Command::Transform { prompt, backend } => {
            let kind = backend.unwrap_or(config.selected_backend);
            let store = Arc::new(StateStore::open_default()?);
            let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
            let client = create_client(&config.backend(kind), store, notifier.clone())?;
            let orchestrator = Orchestrator::new(
                client,
                Arc::new(StdioAdapter),
                notifier,
                config.transform_timeout(),
            );
            match orchestrator.trigger(mode(prompt)).await {
                TransformOutcome::Pasted(_) | TransformOutcome::CopiedToClipboard(_) => Ok(()),
                other => bail!("transformation did not complete: {:?}", other),
            }
        }
        Command::SignIn => {
            let store = Arc::new(StateStore::open_default()?);
            let client =
                GatewayClient::new(&config.backends.gateway, store, Arc::new(LogNotifier))?;
            client.sign_in().await?;
            println!("Signed in; ticket saved");
            Ok(())
        }
        Command::Config => {
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
    }
}
