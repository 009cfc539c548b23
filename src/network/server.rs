//! HTTP Server
//!
//! Owns the service lifecycle:
//!
//! ```text
//! Starting ──► Serving ──(shutdown)──► Draining ──(drained | grace elapsed)──► Stopped
//! ```
//!
//! The storage engine is closed once, after draining; any request still
//! running past the grace period is abandoned and can no longer commit.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::auth::AccessControl;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::handler::RequestHandler;
use crate::store::{BucketStore, MemoryStore, Store};

use super::routes;

/// Lifecycle phase of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// HTTP server for httpkv
pub struct Server {
    config: Config,

    /// Durable engine; `None` for an in-memory server
    engine: Option<Arc<Engine>>,

    handler: Arc<RequestHandler>,
    listener: TcpListener,
    phase: Arc<watch::Sender<Phase>>,
}

impl Server {
    /// Open storage, ensure the bucket exists and bind the listener
    ///
    /// Any error here is fatal: the server never reaches `Serving`.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let engine = Arc::new(Engine::open(config.clone())?);
        let store = BucketStore::open(Arc::clone(&engine))?;
        tracing::info!("Storage opened at {}", config.data_dir.display());

        Self::bind(config, Arc::new(store), Some(engine)).await
    }

    /// Like `start`, but nothing survives the process
    pub async fn start_in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::warn!("Running with in-memory storage; data will not persist");

        Self::bind(config, Arc::new(MemoryStore::new()), None).await
    }

    async fn bind(
        config: Config,
        store: Arc<dyn Store>,
        engine: Option<Arc<Engine>>,
    ) -> Result<Self> {
        let (phase, _) = watch::channel(Phase::Starting);

        let listener = TcpListener::bind(&config.listen_addr).await?;

        let access = AccessControl::new(config.auth_key.clone());
        let handler = RequestHandler::new(store, access).with_max_value_size(config.max_value_size);

        Ok(Self {
            config,
            engine,
            handler: Arc::new(handler),
            listener,
            phase: Arc::new(phase),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Observe lifecycle transitions
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Serve until `shutdown` resolves, then drain and close storage
    ///
    /// `shutdown` is awaited once; later signals change nothing.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            config,
            engine,
            handler,
            listener,
            phase,
        } = self;

        let local_addr = listener.local_addr()?;
        let app = routes::router(handler);

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let signal_phase = Arc::clone(&phase);
        let graceful = async move {
            shutdown.await;
            signal_phase.send_replace(Phase::Draining);
            tracing::info!("Shutting down server...");
            let _ = drain_tx.send(());
        };

        phase.send_replace(Phase::Serving);
        tracing::info!("Listening on {}", local_addr);

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .into_future();
        tokio::pin!(serve);

        let grace = config.shutdown_grace;
        let deadline = async move {
            match drain_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                // Serving ended without a shutdown request
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            served = &mut serve => {
                served?;
                tracing::info!("All in-flight requests completed");
            }
            _ = deadline => {
                tracing::warn!(
                    "Grace period of {:?} elapsed; abandoning in-flight requests",
                    grace
                );
            }
        }

        let closed = match engine {
            Some(engine) => tokio::task::spawn_blocking(move || engine.close())
                .await
                .map_err(|e| KvError::Task(e.to_string()))
                .and_then(|closed| closed),
            None => Ok(()),
        };

        phase.send_replace(Phase::Stopped);
        tracing::info!("Server exiting");
        closed
    }
}

/// Resolves on the first SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
