//! Server module for Sockrelay
//!
//! The accept loop, the fault-isolating session pool and the per-connection
//! session flow.

mod log;
mod pool;
#[allow(clippy::module_inception)]
mod server;
mod session;

pub use log::{LogRecord, MemoryLog, SessionLog, TracingLog};
pub use pool::{PoolStats, PoolStatsSnapshot, SessionPool};
pub use server::Server;
pub use session::{Session, SessionContext, SessionSettings};

use crate::config::Config;
use anyhow::Result;
use tokio::sync::broadcast;

/// Run the server with the given configuration
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let server = Server::bind(config.server).await?;
    server.run(shutdown_rx).await
}
