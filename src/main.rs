//! nutricache server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            nutricache                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Reactor    │───▶│   Workers    │───▶│  Food Cache  │       │
//! │  │  (sockets)   │◀───│  (requests)  │    │  + writers   │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             ▼                                   │
//! │                     FoodData Central                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nutricache::cache::{CacheConfig, FoodCache};
use nutricache::error::{Error, Result};
use nutricache::provider::{UsdaConfig, UsdaProvider, DEFAULT_USDA_URL};
use nutricache::request::{HandlerConfig, RequestHandler};
use nutricache::server::{Server, ServerConfig, READ_BUFFER_BYTES};

// =============================================================================
// CLI Arguments
// =============================================================================

/// nutricache - durable caching proxy for USDA FoodData Central
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "NUTRICACHE_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "NUTRICACHE_PORT", default_value = "7777")]
    port: u16,

    /// Durable cache log
    #[arg(long, env = "NUTRICACHE_CACHE_FILE", default_value = "./data/cache.jsonl")]
    cache_file: PathBuf,

    /// FoodData Central API key
    #[arg(long, env = "USDA_API_KEY", hide_env_values = true)]
    api_key: String,

    /// FoodData Central base URL
    #[arg(long, env = "USDA_API_URL", default_value = DEFAULT_USDA_URL)]
    api_url: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "USDA_REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Cache writer threads
    #[arg(long, env = "NUTRICACHE_WRITERS", default_value = "4")]
    writers: usize,

    /// Request worker threads
    #[arg(long, env = "NUTRICACHE_WORKERS", default_value = "9")]
    workers: usize,

    /// Highest search page fetched per request
    #[arg(long, env = "NUTRICACHE_MAX_PAGES", default_value = "10")]
    max_pages: u32,

    /// Per-connection reply buffer in bytes
    #[arg(long, env = "NUTRICACHE_OUTPUT_BUFFER_BYTES", default_value = "262144")]
    output_buffer_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting nutricache");
    info!("  Cache file: {}", args.cache_file.display());
    info!("  FoodData Central: {}", args.api_url);
    info!("  Writers: {}, workers: {}", args.writers, args.workers);

    // Blocking HTTP client; built before any runtime exists
    let provider = UsdaProvider::new(UsdaConfig {
        base_url: args.api_url.clone(),
        api_key: args.api_key.clone(),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ..Default::default()
    })?;

    let cache = Arc::new(FoodCache::open(CacheConfig {
        log_path: args.cache_file.clone(),
        writer_threads: args.writers,
    })?);

    let handler = Arc::new(RequestHandler::new(
        Arc::clone(&cache),
        Arc::new(provider),
        HandlerConfig {
            max_pages: args.max_pages,
        },
    )?);

    let mut server = Server::start(
        ServerConfig {
            bind_addr: SocketAddr::new(args.host, args.port),
            worker_threads: args.workers,
            output_buffer_bytes: args.output_buffer_bytes,
            read_buffer_bytes: READ_BUFFER_BYTES,
        },
        handler,
    )?;
    info!("Listening on {}", server.local_addr());

    wait_for_ctrl_c()?;
    info!("Shutdown requested");

    server.shutdown();
    let stats = cache.shutdown();

    info!(
        hits = stats.hits,
        misses = stats.misses,
        persisted = stats.persisted,
        "nutricache shutdown complete"
    );
    Ok(())
}

fn wait_for_ctrl_c() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("signal runtime: {}", e)))?;
    runtime.block_on(tokio::signal::ctrl_c())?;
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for noisy in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = noisy.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
