use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use wavespace_core::api;
use wavespace_core::tasks::spawn_maintenance_task;

mod context;
use context::ServerContext;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "wavespace")]
#[command(author, version, about = "WAVE SPACE points ledger server")]
pub struct Args {
    /// Address to which the HTTP API will bind
    #[arg(long, env = "WAVESPACE_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    /// Backing store for balances and transactions
    #[arg(long, value_enum, env = "WAVESPACE_STORE", default_value = "postgres")]
    pub store: StoreKind,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://postgres@localhost:5432/wavespace")]
    pub database_url: String,

    #[arg(long, env = "WAVESPACE_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// Disable the read cache
    #[arg(long, env = "WAVESPACE_NO_CACHE", default_value = "false")]
    pub no_cache: bool,

    #[arg(long, env = "WAVESPACE_CACHE_TTL_SECS", default_value_t = 180)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "WAVESPACE_MAX_COMMIT_ATTEMPTS", default_value_t = 3)]
    pub max_commit_attempts: u32,

    #[arg(long, env = "WAVESPACE_STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Offset of the platform day boundary from UTC, in minutes
    #[arg(long, env = "WAVESPACE_DAY_OFFSET_MINUTES", default_value_t = 0, allow_hyphen_values = true)]
    pub day_offset_minutes: i32,

    #[arg(long, env = "WAVESPACE_DEFAULT_BOOSTER_SECS", default_value_t = 3600)]
    pub default_booster_secs: i64,

    /// How often expired cache entries and idle account locks are dropped
    #[arg(long, env = "WAVESPACE_MAINTENANCE_INTERVAL_SECS", default_value_t = 60)]
    pub maintenance_interval_secs: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("wavespace=info".parse().unwrap_or_default())
        .add_directive("tower_http=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("WAVE SPACE starting. store={:?}, addr={}", args.store, args.server_addr);

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let addr: SocketAddr = args.server_addr.parse()?;
    let ctx = ServerContext::new(&args).await?;

    let maintenance = spawn_maintenance_task(
        ctx.ledger.clone(),
        Duration::from_secs(args.maintenance_interval_secs.max(1)),
        ctx.event_bus.shutdown_rx.clone(),
    );

    // Handle Ctrl-C to signal shutdown
    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        let event_bus = ctx.event_bus.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Ctrl-C handler error: {:?}", e);
                return;
            }
            info!("Ctrl-C detected; shutting down...");
            event_bus.shutdown();
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });
    }

    api::serve(addr, ctx.api_state(), handle).await?;

    ctx.event_bus.shutdown();
    if let Err(e) = maintenance.await {
        error!("Maintenance task ended abnormally: {:?}", e);
    }
    if let Some(db) = &ctx.db {
        db.pool().close().await;
    }
    Ok(())
}
