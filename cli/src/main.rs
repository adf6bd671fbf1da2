//! Link Order reference storefront server
//!
//! ```sh
//! # Run with default config (~/.config/link-order/config.toml)
//! link-order
//!
//! # Custom config path and port
//! link-order --config /etc/link-order/config.toml --port 8080
//!
//! # Validate config without starting
//! link-order --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use link_order::config::AppConfig;
use link_order::domain::parse_rules;
use link_order::server::{init_tracing, ServerHandle, ServerOptions};

/// Storefront that turns `/?gArticle=<code>` links into cart adds.
#[derive(Parser, Debug)]
#[command(
    name = "link-order",
    version,
    about = "Order-by-link reference storefront",
    long_about = "Serves a storefront whose home page adds a configured product to the cart \
                  and redirects to checkout when visited with ?gArticle=<code>.\n\n\
                  Default config: ~/.config/link-order/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "LINK_ORDER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(link_order::default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if cli.check {
        if let Some(e) = load_error {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Address     : {}", config.address());
        println!("   Parameter   : {}", config.link_order.query_parameter);
        println!("   Rules       : {}", parse_rules(&config.link_order.article_and_prices).len());
        println!("   Products    : {}", config.catalog.len());
        println!(
            "   Admin API   : {}",
            if config.admin.api_key.is_some() { "enabled" } else { "disabled" }
        );
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        ..ServerOptions::default()
    })
    .await?;

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
