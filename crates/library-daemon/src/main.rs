//! library-daemon: keeps a library folder canonical while it is edited.
//!
//! Heals the whole tree on start, then watches the folder and heals every
//! section an edit touches.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;

use library_daemon::{heal_once, resolve_library_root, watch};
use library_healer::{EventBus, HealerConfig};

#[derive(Parser, Debug)]
#[command(name = "library-daemon")]
#[command(about = "Self-healing library daemon")]
struct Args {
    /// Path to the library folder (defaults to $LIBRARY_ROOT)
    #[arg(short, long)]
    library: Option<String>,

    /// Healer config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Heal the whole library once and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,library_daemon=debug,library_healer=debug"
    } else {
        "info,library_daemon=info,library_healer=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let root = resolve_library_root(args.library.as_deref(), |name| std::env::var(name).ok())?;
    let config = HealerConfig::load_or_default(args.config.as_deref())?;
    info!("Library root: {:?}", root);
    info!("Debounce: {}ms", config.debounce_ms);

    let events = Arc::new(EventBus::new());
    let _trace = events.subscribe(|event| {
        if let Ok(json) = serde_json::to_string(&event) {
            trace!(target: "library_daemon::events", "{}", json);
        }
    });

    if args.once {
        heal_once(&root, config, events).await?;
        return Ok(());
    }

    info!("Daemon running. Press Ctrl+C to stop.");
    watch(&root, config, events, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
