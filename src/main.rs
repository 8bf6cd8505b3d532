//! bonocore ops CLI
//!
//! Small operational tool over the engine's cache API: probe the remote
//! store, inspect tier statistics, and invalidate cached windows when a
//! user's underlying data changes.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bonocore::cache::LocalCacheConfig;
use bonocore::{HybridCache, RedisSettings, RedisStore};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cache operations for the operator bonus engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Remote cache host
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    redis_host: String,

    /// Remote cache port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    redis_port: u16,

    /// Remote cache password
    #[arg(long, env = "REDIS_PASSWORD")]
    redis_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check connectivity to the remote cache tier
    Ping,
    /// Print cache tier statistics
    Stats,
    /// Clear every cached window for one user
    InvalidateUser {
        /// Employee code, e.g. E001
        user_code: String,
    },
    /// Delete keys matching a glob pattern from both tiers
    DelPattern {
        /// Pattern, e.g. "bonuses:E001:*"
        pattern: String,
    },
    /// Clear both cache tiers completely
    Flush,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let settings = RedisSettings {
        host: args.redis_host.clone(),
        port: args.redis_port,
        password: args.redis_password.clone(),
    };

    let remote = Arc::new(RedisStore::new(settings));
    let cache = HybridCache::connect(remote, LocalCacheConfig::default()).await;

    match args.command {
        Command::Ping => {
            if cache.is_remote_up() {
                info!(host = %args.redis_host, port = args.redis_port, "remote cache reachable");
                println!("PONG");
            } else {
                warn!("remote cache unreachable, engine would run local-only");
                std::process::exit(1);
            }
        }
        Command::Stats => {
            let stats = cache.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::InvalidateUser { user_code } => {
            let removed = cache.invalidate_user(&user_code).await;
            println!("removed {removed} keys for user {user_code}");
        }
        Command::DelPattern { pattern } => {
            let removed = cache.del_pattern(&pattern).await;
            println!("removed {removed} keys matching {pattern}");
        }
        Command::Flush => {
            cache.flush_all().await;
            println!("cache flushed");
        }
    }

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

    let filter = EnvFilter::from_default_env().add_directive(level.into());

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
