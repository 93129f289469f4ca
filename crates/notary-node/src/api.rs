use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use notary_core::{now_millis, Block, LedgerStore, MineError, Miner, Transaction, TransactionPool};
use notary_storage::SledPool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LedgerStore>,
    pub pool: Arc<SledPool>,
    pub miner: Arc<Miner<SledPool>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/genesis", post(create_genesis))
        .route("/mine", post(mine))
        .route("/tx", post(submit_transaction))
        .route("/chain", get(current_chain))
        .route("/chain/head", get(chain_head))
        .route("/chain/replace", post(replace_chain))
        .route("/pool", get(pending_pool))
        .route("/transactions/packed", get(packed_transactions))
        .route("/peer/block", post(receive_peer_block))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxIn {
    id: String,
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    timestamp: Option<u64>,
    data: String,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn create_genesis(State(state): State<AppState>) -> Response {
    let miner = state.miner.clone();
    match tokio::task::spawn_blocking(move || miner.create_genesis()).await {
        Ok(block) => Json(block).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn mine(State(state): State<AppState>) -> Response {
    let miner = state.miner.clone();
    let mined = match tokio::task::spawn_blocking(move || miner.mine()).await {
        Ok(mined) => mined,
        Err(err) => return internal_error(err),
    };
    match mined {
        Ok(block) => Json(block).into_response(),
        Err(err @ MineError::ChainNotInitialized) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
        Err(err @ MineError::StaleTip) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string(), "retryable": true })),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

async fn submit_transaction(State(state): State<AppState>, Json(tx): Json<TxIn>) -> Response {
    let tx = Transaction {
        id: tx.id,
        public_key: tx.public_key,
        signature: tx.signature,
        timestamp: tx.timestamp.unwrap_or_else(now_millis),
        data: tx.data,
    };
    match state.pool.admit(tx) {
        Ok(admitted) => Json(json!({ "admitted": admitted })).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn current_chain(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.store.current_chain())
}

async fn chain_head(State(state): State<AppState>) -> Json<Head> {
    Json(Head {
        height: state.store.height(),
        hash: state.store.tip_hash(),
    })
}

async fn replace_chain(State(state): State<AppState>, Json(candidate): Json<Vec<Block>>) -> Response {
    let replaced = state.store.replace_chain(candidate, state.pool.as_ref());
    Json(json!({ "replaced": replaced })).into_response()
}

async fn pending_pool(State(state): State<AppState>) -> Response {
    match state.pool.records() {
        Ok(records) => Json(records).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn packed_transactions(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.store.packaged_transactions())
}

/// Accept a single block pushed by a peer that just mined it. The usual
/// stale and validity rules apply; a rejected block simply reports
/// `accepted: false` so the peer can fall back to a full chain exchange.
async fn receive_peer_block(State(state): State<AppState>, Json(block): Json<Block>) -> Response {
    let accepted = state.store.append(&block);
    if accepted {
        let ids: Vec<String> = block.transactions.iter().map(|tx| tx.id.clone()).collect();
        if let Err(err) = state.pool.remove(&ids) {
            warn!(%err, "failed to reconcile the pool after accepting a peer block");
        }
    }
    Json(json!({ "accepted": accepted })).into_response()
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    warn!(%err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}
