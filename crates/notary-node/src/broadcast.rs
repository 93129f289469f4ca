use notary_core::{Block, Broadcaster};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Pushes freshly committed blocks to peer nodes over HTTP. Fire and
/// forget: delivery failures are logged and never retried; a peer that
/// missed a block recovers through the chain-replace exchange.
pub struct HttpBroadcaster {
    client: reqwest::Client,
    peers: Vec<String>,
    handle: Handle,
}

impl HttpBroadcaster {
    /// Must be called from inside the runtime; the miner later invokes
    /// `broadcast_block` from a blocking worker.
    pub fn new(peers: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            peers,
            handle: Handle::current(),
        }
    }
}

impl Broadcaster for HttpBroadcaster {
    fn broadcast_block(&self, block: &Block) {
        for peer in &self.peers {
            let url = format!("{peer}/peer/block");
            let client = self.client.clone();
            let block = block.clone();
            self.handle.spawn(async move {
                match client.post(&url).json(&block).send().await {
                    Ok(res) => debug!(%url, status = %res.status(), "pushed block to peer"),
                    Err(err) => warn!(%url, %err, "failed to push block to peer"),
                }
            });
        }
    }
}
