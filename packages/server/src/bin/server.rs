use anyhow::Context;
use clap::Parser;
use loupe_server::{serve, AppState, Config, FileWatcher};
use loupe_transform::Registry;
use std::path::PathBuf;
use tracing::info;

/// Loupe - write visual edits back to source
#[derive(Parser, Debug)]
#[command(name = "loupe-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing loupe.config.json
    #[arg(short, long)]
    cwd: Option<PathBuf>,

    /// Project root, overrides `root`
    #[arg(long)]
    root: Option<String>,

    /// Address to listen on, overrides `bind`
    #[arg(short, long)]
    bind: Option<String>,

    /// Decimals written for style numbers, overrides `precision`
    #[arg(long)]
    precision: Option<u8>,

    /// Keep four-value box properties expanded
    #[arg(long)]
    no_collapse: bool,

    /// Do not watch the root for external changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,loupe=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };

    let mut config = Config::load(&cwd)?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(precision) = cli.precision {
        config.precision = precision;
    }
    if cli.no_collapse {
        config.collapse_shorthand = false;
    }
    if cli.no_watch {
        config.watch = false;
    }

    let root = config
        .root_dir(&cwd)
        .canonicalize()
        .with_context(|| format!("Project root {} does not exist", config.root))?;
    let addr = config.bind_addr()?;

    let registry = Registry::builder().with_builtins()?.build();
    info!(types = ?registry.types(), "Registered transforms");

    let mut state = AppState::new(&root, registry).with_options(config.serialize_options());

    // Held for the lifetime of the server
    let _watcher = if config.watch {
        let watcher = FileWatcher::new(&root)?;
        state = state.with_changes(watcher.sender());
        info!("Watching {}", root.display());
        Some(watcher)
    } else {
        None
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Loupe server listening on ws://{}/ws", addr);
    info!("Project root: {}", root.display());

    serve(listener, state).await?;
    Ok(())
}
