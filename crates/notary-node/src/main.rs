use anyhow::Result;
use clap::Parser;
use notary_core::{Broadcaster, LedgerStore, Miner, NoopBroadcaster};
use notary_storage::SledPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

mod api;
mod broadcast;

use api::AppState;
use broadcast::HttpBroadcaster;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for the sled-backed pending pool
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Leading zero hex characters required of block hashes
    #[arg(long, default_value_t = notary_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Name stamped into filler transactions; defaults to the listen address
    #[arg(long)]
    node_id: Option<String>,

    /// Peer base URL mined blocks are pushed to, repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let node_id = args.node_id.clone().unwrap_or_else(|| args.listen.clone());

    let store = Arc::new(LedgerStore::new(args.difficulty));
    let pool = Arc::new(SledPool::open(&args.data_dir)?);
    let broadcaster: Arc<dyn Broadcaster> = if args.peers.is_empty() {
        Arc::new(NoopBroadcaster)
    } else {
        info!(peers = args.peers.len(), "pushing mined blocks to peers");
        Arc::new(HttpBroadcaster::new(args.peers.clone()))
    };
    let miner = Arc::new(Miner::new(store.clone(), pool.clone(), broadcaster, node_id));

    let state = AppState { store, pool, miner };
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!(difficulty = args.difficulty, "notary-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
