//! TicketVault backend server.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketvault_backend::{api::create_router, store::LedgerStore};

#[derive(Parser, Debug)]
#[command(name = "ticketvault", about = "Event-financing ledger backend")]
struct Args {
    /// Path to the SQLite ledger database
    #[arg(long, env = "TICKETVAULT_DB", default_value = "ticketvault.db")]
    db_path: String,

    /// Address to bind the HTTP server to
    #[arg(long, env = "TICKETVAULT_BIND", default_value = "0.0.0.0:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketvault_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let store = LedgerStore::open(&args.db_path)
        .with_context(|| format!("open ledger store at {}", args.db_path))?;
    info!(db_path = %args.db_path, "ledger store ready");

    let app = create_router(store)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(addr = %args.bind, "ticketvault backend listening");
    axum::serve(listener, app).await.context("serve http")?;

    Ok(())
}
