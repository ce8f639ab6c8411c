use crate::annotator::Annotator;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::ingest::SourceIngestor;
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{
    signal,
    sync::{broadcast, mpsc},
};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let broadcaster = Arc::new(Broadcaster::new());

    let ingestor = match SourceIngestor::from_config(&config.source, metrics.clone()) {
        Ok(ingestor) => ingestor,
        Err(e) => {
            tracing::error!("Failed to initialize source ingestor: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let annotator = match Annotator::from_config(&config, metrics.clone()) {
        Ok(annotator) => annotator,
        Err(e) => {
            tracing::error!("Failed to initialize annotator: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let state = SharedState {
        broadcaster: broadcaster.clone(),
        metrics,
    };
    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    // A single slot: the ingestor drops frames while the annotator is busy.
    let (frame_tx, frame_rx) = mpsc::channel(1);

    let (ingest_rx, annotate_rx) = (shutdown_tx.subscribe(), shutdown_tx.subscribe());
    let ingest_handle = tokio::spawn(ingestor.run(frame_tx, ingest_rx));
    let annotate_handle = tokio::spawn(annotator.run(frame_rx, broadcaster.clone(), annotate_rx));
    let server_handle = server.run(shutdown_tx.subscribe());

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let (ingested, annotated) = tokio::join!(ingest_handle, annotate_handle);
    if let Err(e) = ingested {
        tracing::error!("Ingest task failed: {}", e);
    }
    if let Err(e) = annotated {
        tracing::error!("Annotate task failed: {}", e);
    }
    broadcaster.shutdown();

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("Server stopped with an error: {}", e);
            return Err(Box::new(e));
        }
        Err(e) => tracing::error!("Server task failed: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
