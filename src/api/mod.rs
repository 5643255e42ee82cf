//! Companion document-store service
//!
//! Serves the persistence interface (user preferences, clips, stats) over
//! HTTP + JSON, backed by the local file store.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::persistence::LocalStore;

pub mod handlers;
pub mod models;
pub mod server;

/// Embedded document-store server
pub struct ApiServer {
    store: Arc<LocalStore>,
    port: u16,
}

impl ApiServer {
    /// Create a new API server over the given document store
    pub fn new(store: Arc<LocalStore>, port: u16) -> Self {
        Self { store, port }
    }

    /// Start the API server in the background
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Start the API server
    async fn start(self) -> Result<()> {
        info!("🚀 Starting document-store server on port {}", self.port);
        server::start_http_server(self.store, self.port).await
    }
}
