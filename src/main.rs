mod cli;

use galleria::{config, server};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "galleria=trace,tower_http=debug".to_string()
        } else {
            "galleria=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            media_root,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(cli.config.as_deref(), host, port, media_root))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("galleria {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(
    config_path: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
    media_root: Option<PathBuf>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI overrides
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(root) = media_root {
        config.media.root = root;
    }

    tracing::info!("Starting galleria server");
    tracing::info!(
        "Serving media from {:?} on {}:{}",
        config.media.root,
        config.server.host,
        config.server.port
    );

    if which::which(&config.tools.ffmpeg).is_err() {
        tracing::warn!(
            "ffmpeg not found ({:?}); transcoding and HEIC conversion will fail",
            config.tools.ffmpeg
        );
    }

    server::start_server(config).await
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(None)?;
    match which::which(&config.tools.ffmpeg) {
        Ok(path) => {
            println!("✓ ffmpeg - {}", path.display());
            println!("\nAll required tools are available!");
        }
        Err(_) => {
            println!("✗ ffmpeg");
            println!("\nffmpeg is missing. Install it to enable transcoding and HEIC conversion.");
        }
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Media root: {:?}", config.media.root);
            println!("  Thumbnail dir: {:?}", config.media.thumbnail_dir);
            println!("  ffmpeg: {:?}", config.tools.ffmpeg);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Media root: {:?}", config.media.root);
        }
    }

    Ok(())
}
