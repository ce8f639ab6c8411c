use crate::{
    broadcast::Broadcaster,
    config::Config,
    routes::{metrics_routes, stream_routes},
    telemetry::Metrics,
};
use axum::Router;
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    BindFailed { addr: String, source: io::Error },
    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}

#[derive(Clone)]
pub struct SharedState {
    pub broadcaster: Arc<Broadcaster>,
    pub metrics: Arc<Metrics>,
}

struct Listener {
    name: &'static str,
    router: Router,
    listener: TcpListener,
}

/// The stream listener plus the optional metrics listener.
pub struct HttpServer {
    listeners: Vec<Listener>,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &Config) -> Result<Self, ServerError> {
        let mut listeners = vec![Listener {
            name: "stream",
            router: stream_routes().with_state(state.clone()),
            listener: bind(config.server.get_address()).await?,
        }];

        if let Some(addr) = config.metrics.get_address(&config.server.host) {
            listeners.push(Listener {
                name: "metrics",
                router: metrics_routes().with_state(state),
                listener: bind(addr).await?,
            });
        }

        Ok(Self { listeners })
    }

    pub fn local_addrs(&self) -> Vec<std::net::SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|l| l.listener.local_addr().ok())
            .collect()
    }

    /// Serves every listener until `shutdown_rx` fires and open responses finish.
    pub fn run(self, shutdown_rx: Receiver<()>) -> JoinHandle<Result<(), ServerError>> {
        let handles: Vec<_> = self
            .listeners
            .into_iter()
            .map(|Listener { name, router, listener }| {
                if let Ok(addr) = listener.local_addr() {
                    tracing::info!("Starting {} listener on {}", name, addr);
                }
                let mut shutdown_rx = shutdown_rx.resubscribe();
                tokio::spawn(async move {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            shutdown_rx.recv().await.ok();
                        })
                        .await?;
                    tracing::info!("{} listener stopped", name);
                    Ok::<_, ServerError>(())
                })
            })
            .collect();

        tokio::spawn(async move {
            for result in futures::future::join_all(handles).await {
                match result {
                    Ok(served) => served?,
                    Err(e) => tracing::error!("Listener task failed: {}", e),
                }
            }
            Ok(())
        })
    }
}

async fn bind(addr: String) -> Result<TcpListener, ServerError> {
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::BindFailed { addr, source })
}
