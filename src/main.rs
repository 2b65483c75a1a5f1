mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use tcd_av::capability::CapabilityCache;
use tcd_av::probe::probe_metadata;
use tcd_av::tools::ToolRegistry;
use tcd_core::config::Config;
use tcd_db::pool::init_pool;
use tcd_db::queries::jobs;
use transcodarr::{queue, server, state::AppState};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);
    config.apply_env_overrides();

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }

    tracing::info!("Starting transcodarr server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!("Media root: {}", config.media.root.display());

    // Initialize database
    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("transcodarr.db");
    tracing::info!("Initializing database at {}", db_path.display());
    let pool = init_pool(&db_path.to_string_lossy())?;

    // Re-queue jobs left running by a previous server session; this
    // instance can never reattach to their processes.
    if let Ok(conn) = pool.get() {
        match jobs::reset_orphaned_jobs(&conn) {
            Ok(count) if count > 0 => {
                tracing::info!("Re-queued {count} orphaned jobs from previous session");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to reset orphaned jobs: {e}");
            }
        }
    }

    let config = Arc::new(config);
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let capabilities = Arc::new(CapabilityCache::new());

    // Start the scheduler
    let cancel = CancellationToken::new();
    let queue_handle = queue::spawn_scheduler(
        pool.clone(),
        config.clone(),
        tools.clone(),
        capabilities.clone(),
        cancel.clone(),
    );

    let state = AppState {
        pool,
        config: config.clone(),
        queue: queue_handle,
        tools,
        capabilities,
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let result = server::serve(state, &config.server.host, config.server.port, shutdown).await;

    tracing::info!("Shutting down...");
    cancel.cancel();

    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "transcodarr=trace,tcd_av=trace,tcd_db=debug,tcd_core=debug,tower_http=debug"
                .to_string()
        } else {
            "transcodarr=debug,tcd_av=debug,tcd_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("transcodarr {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&tcd_core::config::ToolsConfig::default());
    let rt = tokio::runtime::Runtime::new()?;
    let metadata = rt.block_on(probe_metadata(&tools, file));

    match metadata {
        Some(meta) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                println!("File: {}", file.display());
                if let Some(codec) = &meta.video_codec {
                    println!("Video: {codec}");
                }
                if let Some(resolution) = &meta.resolution {
                    println!("Resolution: {resolution}");
                }
                if let Some(duration) = meta.duration {
                    let secs = duration as u64;
                    println!(
                        "Duration: {:02}:{:02}:{:02}",
                        secs / 3600,
                        (secs / 60) % 60,
                        secs % 60
                    );
                }
                if let Some(bit_rate) = meta.bit_rate {
                    println!("Bitrate: {bit_rate} b/s");
                }
            }
            Ok(())
        }
        None => {
            anyhow::bail!("Not a media file (or ffprobe is unavailable)");
        }
    }
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&tcd_core::config::ToolsConfig::default());
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable encoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)?;
            let config = Config::from_json(&contents)?;
            let warnings = config.validate();

            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Media root: {}", config.media.root.display());
            println!("  Max concurrent jobs: {}", config.queue.max_concurrent_jobs);
            println!("  Tick interval: {}s", config.queue.tick_secs);

            for warning in warnings {
                println!("  ⚠ {warning}");
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Media root: {}", config.media.root.display());
        }
    }

    Ok(())
}
