mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use vidgate::{config, engine, server};

async fn start_gateway(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting vidgate server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidgate=trace,tower_http=debug".to_string()
        } else {
            "vidgate=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_gateway(host, port, cli.config.as_deref()))
        }
        Commands::Parse { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(parse_once(&url, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn parse_once(url: &str, json: bool, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let engine = Arc::new(engine::YtDlpEngine::new(&config.extractor.binary));
    let ctx = server::AppContext::new(config, engine);

    let summary = ctx.pipeline.parse(url, "cli").await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Platform:  {}", summary.platform);
    println!("Title:     {}", summary.title);
    if !summary.thumbnail.is_empty() {
        println!("Thumbnail: {}", summary.thumbnail);
    }

    println!("\nFormats: {}", summary.formats.len());
    for format in &summary.formats {
        println!("  [{:?}] {} - {}", format.kind, format.quality, format.url);
    }

    println!("\nImages: {}", summary.images.len());
    for image in &summary.images {
        println!("  {} - {}", image.label, image.url);
    }

    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let status = engine::resolver_status(&config.extractor.binary);
    let mark = if status.available { "✓" } else { "✗" };

    print!("{} {}", mark, status.name);
    if let Some(ref version) = status.version {
        print!(" ({})", version.lines().next().unwrap_or(""));
    }
    if let Some(ref path) = status.path {
        print!(" - {}", path.display());
    }
    println!();

    println!();
    if status.available {
        println!("Resolver is available!");
    } else {
        println!("Resolver is missing. Install it to enable extractions.");
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
            println!(
                "  Limits: {} parses / {} views per client",
                config.limits.usage_limit, config.limits.view_limit
            );
            println!(
                "  Extractor: {} ({} attempts, <= {}p)",
                config.extractor.binary, config.extractor.attempts, config.extractor.max_height
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  Limits: {} parses / {} views per client",
                config.limits.usage_limit, config.limits.view_limit
            );
        }
    }

    Ok(())
}
