use crate::chain::store::ChainStore;
use crate::config::GLOBAL_CONFIG;
use crate::error::{CoinError, Result};
use crate::network::handlers::handle_connection;
use crate::network::operations::send_version;
use crate::node::state::NodeState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// The node's TCP front: accepts connections, one task per request, until a
/// shutdown signal arrives. On shutdown the chain database is flushed before
/// returning so the value log is never left dirty.
pub struct Server {
    chain: ChainStore,
    state: Arc<NodeState>,
}

impl Server {
    pub fn new(chain: ChainStore) -> Server {
        Server {
            chain,
            state: Arc::new(NodeState::new(GLOBAL_CONFIG.central_node())),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let node_addr = GLOBAL_CONFIG.node_addr()?;
        let listener = TcpListener::bind(node_addr)
            .await
            .map_err(|e| CoinError::Io(e.to_string()))?;
        info!(addr = %node_addr, "node listening");

        // Everyone except the bootstrap node announces itself to it; the
        // height exchange from there drives initial sync.
        let central_node = GLOBAL_CONFIG.central_node();
        if node_addr != central_node {
            let best_height = self.chain.get_best_height().await?;
            send_version(&self.state, &central_node, best_height).await;
        }

        loop {
            tokio::select! {
                _ = shutdown_signal() => {
                    info!("shutdown signal received, closing chain store");
                    self.state.request_shutdown();
                    self.chain.flush().await?;
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let chain = self.chain.clone();
                            let state = self.state.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(chain, state, stream).await {
                                    error!(peer = %peer_addr, error = %e, "request failed");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
