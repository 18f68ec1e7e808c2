//! Listening server
//!
//! Accepts client connections and hands each one to the session pool.

use super::log::{SessionLog, TracingLog};
use super::pool::{PoolStats, SessionPool};
use super::session::{Session, SessionContext, SessionSettings};
use crate::config::ServerConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Back-off after a failed accept, so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(100);

/// SOCKS5 server bound to its listening socket
pub struct Server {
    listener: TcpListener,
    settings: Arc<SessionSettings>,
    log: Arc<dyn SessionLog>,
    stats: Arc<PoolStats>,
}

impl Server {
    /// Bind the listening socket described by `config`
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        Ok(Server {
            listener,
            settings: Arc::new(SessionSettings::new(config)),
            log: Arc::new(TracingLog),
            stats: Arc::new(PoolStats::new()),
        })
    }

    /// Replace the session log sink
    pub fn with_log(mut self, log: Arc<dyn SessionLog>) -> Self {
        self.log = log;
        self
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Session counters, live while the server runs
    pub fn stats(&self) -> Arc<PoolStats> {
        self.stats.clone()
    }

    /// Accept connections until shutdown.
    ///
    /// On shutdown every running session is cancelled and awaited before
    /// this returns.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("Listening on {}", self.local_addr()?);

        let mut pool = SessionPool::new(self.log.clone(), self.stats.clone());
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let local_addr = match stream.local_addr() {
                                Ok(addr) => addr,
                                Err(e) => {
                                    warn!("Dropping connection from {}: {}", peer_addr, e);
                                    continue;
                                }
                            };
                            self.settings.socket_opts.hint(&stream);

                            next_id += 1;
                            let ctx = SessionContext {
                                id: next_id,
                                peer_addr,
                                local_addr,
                            };
                            debug!("Accepted {}", ctx);

                            let session =
                                Session::new(ctx, stream, self.settings.clone(), self.log.clone());
                            pool.spawn(ctx.label(), move |cancel| session.run(cancel));
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                        }
                    }
                }
                _ = pool.reap_next(), if !pool.is_empty() => {}
            }
        }

        let remaining = pool.len();
        if remaining > 0 {
            info!("Waiting for {} session(s) to stop", remaining);
        }
        pool.shutdown().await;

        info!("Server stopped");
        Ok(())
    }
}
