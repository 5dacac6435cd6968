//! Server lifecycle: sync loop, HTTP listener and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use watchparty_api::{create_router, AppState, WsSettings};
use watchparty_core::{Config, EngineSettings, EventDispatcher, SyncHandle, SyncServer, SystemClock};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct WatchPartyServer {
    config: Config,
    cancel: CancellationToken,
}

impl WatchPartyServer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Start all components and wait for a shutdown signal.
    pub async fn start(self) -> anyhow::Result<()> {
        let settings = EngineSettings::from(&self.config.room);
        info!(
            grace_period_secs = settings.grace_period.as_secs(),
            max_members = settings.max_members,
            playback_policy = ?settings.playback_policy,
            host_leave_policy = ?settings.host_leave_policy,
            "Room engine configured"
        );

        let dispatcher = EventDispatcher::new(settings, Arc::new(SystemClock));
        let (sync_server, sync) = SyncServer::new(dispatcher, self.config.server.outbound_buffer);
        let sync_cancel = self.cancel.child_token();
        let sync_handle = tokio::spawn(sync_server.run(sync_cancel.clone()));

        let http_shutdown = CancellationToken::new();
        let http_handle = self.start_http_server(sync.clone(), http_shutdown.clone()).await?;

        info!("All servers started successfully");

        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        // Stop accepting, let open sockets close, then stop the sync loop.
        http_shutdown.cancel();
        drain_connections(&sync).await;
        sync_cancel.cancel();
        if let Err(e) = sync_handle.await {
            warn!("Sync server task ended abnormally: {}", e);
        }

        info!("WatchParty server stopped");
        Ok(())
    }

    async fn start_http_server(
        &self,
        sync: SyncHandle,
        shutdown: CancellationToken,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();
        let http_addr: std::net::SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;
        info!("HTTP server listening on {}", http_addr);

        let router = create_router(AppState {
            sync,
            ws: WsSettings::from(&self.config.server),
        });

        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                error!("HTTP server error: {}", e);
            }
            info!("HTTP server shut down gracefully");
        }))
    }
}

/// Wait (bounded) for open WebSocket connections to go away.
async fn drain_connections(sync: &SyncHandle) {
    let active = sync.connection_count();
    if active == 0 {
        return;
    }
    info!(
        "Waiting up to {}s for {} active connection(s) to drain...",
        DRAIN_TIMEOUT.as_secs(),
        active
    );
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    loop {
        let remaining = sync.connection_count();
        if remaining == 0 {
            info!("All connections drained");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(
                "Drain timeout reached with {} connection(s) still active, proceeding with shutdown",
                remaining
            );
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
