//! gridcatd — the gridcat daemon.
//!
//! Single binary that assembles:
//! - Database pool (PostgreSQL/PostGIS or SQLite)
//! - Optional catalog schema bootstrap
//! - Dynamic route table + registrar
//! - REST API
//!
//! # Usage
//!
//! ```text
//! gridcatd --config /etc/gridcat/gridcat.toml
//! DATABASE_URL=postgres://gridcat@db/gridcat gridcatd --bind 0.0.0.0:8000 --init-schema
//! ```

use std::path::PathBuf;

use clap::Parser;
use gridcat_core::GridcatConfig;
use gridcat_routes::{QueryPolicy, Registrar, RouteTable};
use tracing::info;

#[derive(Parser)]
#[command(name = "gridcatd", about = "gridcat electric network catalog daemon")]
struct Cli {
    /// Path to gridcat.toml. Built-in defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Database URL, overrides `database.url`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Create the PostGIS extension and catalog tables before serving.
    #[arg(long)]
    init_schema: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<GridcatConfig> {
        let mut config = match &self.config {
            Some(path) => GridcatConfig::from_file(path)?,
            None => GridcatConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if self.init_schema {
            config.database.init_schema = true;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,gridcatd=debug,gridcat=debug")
                }),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    run(config).await
}

async fn run(config: GridcatConfig) -> anyhow::Result<()> {
    info!("gridcat daemon starting");

    let addr = config.server.socket_addr()?;

    // ── Database ───────────────────────────────────────────────

    let executor = gridcat_store::connect(&config.database).await?;
    if config.database.init_schema {
        gridcat_store::schema::bootstrap(executor.as_ref()).await?;
    }

    // ── Dynamic routes ─────────────────────────────────────────

    let policy = QueryPolicy::from_read_only(config.routes.read_only);
    let registrar = Registrar::new(RouteTable::new(), policy);
    info!(?policy, "route registrar ready");

    // ── API server ─────────────────────────────────────────────

    let state = gridcat_api::ApiState::new(executor, registrar);
    let router = gridcat_api::build_router(state, config.server.request_timeout());

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("gridcat daemon stopped");
    Ok(())
}
