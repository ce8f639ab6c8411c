use crate::config::SourceConfig;
use crate::frame::Frame;
use crate::telemetry::{DropStage, Metrics};
use reqwest::{header, Client, StatusCode};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, mpsc::error::TrySendError},
    time::sleep,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to build http client: {0}")]
    ClientBuildFailed(reqwest::Error),
    #[error("Request to stream source failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Stream source answered with status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("Stream source sent no Content-Type header")]
    MissingContentType,
    #[error("Invalid Content-Type {0:?}")]
    InvalidContentType(String),
    #[error("Content-Type {0:?} carries no multipart boundary")]
    MissingBoundary(String),
    #[error("Failed to read multipart part: {0}")]
    PartReadFailed(#[from] multer::Error),
    #[error("Stream source closed the stream")]
    StreamEnded,
}

/// Extracts the multipart boundary from a `Content-Type` value, without
/// any leading or trailing dashes.
pub fn parse_boundary(content_type: &str) -> Result<String, SourceError> {
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| SourceError::InvalidContentType(content_type.to_string()))?;
    let boundary = mime
        .get_param(mime::BOUNDARY)
        .map(|name| name.as_str().trim_matches('-'))
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| SourceError::MissingBoundary(content_type.to_string()))?;
    Ok(boundary.to_string())
}

/// Reads successive JPEG parts from one upstream connection.
pub struct FrameReader {
    multipart: multer::Multipart<'static>,
}

impl FrameReader {
    pub async fn connect(client: &Client, url: &str) -> Result<Self, SourceError> {
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::UnexpectedStatus(response.status()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or(SourceError::MissingContentType)?;
        let boundary = parse_boundary(content_type)?;

        Ok(Self {
            multipart: multer::Multipart::new(response.bytes_stream(), boundary),
        })
    }

    /// Reads the next part in full.
    pub async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        match self.multipart.next_field().await? {
            Some(field) => Ok(Frame::from(field.bytes().await?)),
            None => Err(SourceError::StreamEnded),
        }
    }
}

enum IngestState {
    Connecting,
    Streaming(FrameReader),
    Backoff,
    Cancelled,
}

/// Keeps a connection to the upstream MJPEG source alive and forwards every
/// part it reads, reconnecting after a fixed delay whenever anything fails.
pub struct SourceIngestor {
    client: Client,
    url: String,
    reconnect_delay: Duration,
    metrics: Arc<Metrics>,
}

impl SourceIngestor {
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(SourceError::ClientBuildFailed)?;
        Ok(Self {
            client,
            url: url.into(),
            reconnect_delay,
            metrics,
        })
    }

    pub fn from_config(config: &SourceConfig, metrics: Arc<Metrics>) -> Result<Self, SourceError> {
        Self::new(config.url.clone(), config.get_reconnect_delay(), metrics)
    }

    /// Runs until `shutdown_rx` fires or the frame consumer goes away.
    ///
    /// Frames are offered with `try_send`; when the consumer is still busy the
    /// frame is dropped so the network read never waits on downstream work.
    pub async fn run(self, frames: mpsc::Sender<Frame>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut state = IngestState::Connecting;

        loop {
            state = match state {
                IngestState::Connecting => {
                    tracing::info!(url = %self.url, "connecting to stream source");
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => IngestState::Cancelled,
                        result = FrameReader::connect(&self.client, &self.url) => match result {
                            Ok(reader) => {
                                tracing::info!(url = %self.url, "streaming from source");
                                IngestState::Streaming(reader)
                            }
                            Err(e) => self.connection_failed(e),
                        },
                    }
                }
                IngestState::Streaming(mut reader) => {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => IngestState::Cancelled,
                        result = reader.next_frame() => match result {
                            Ok(frame) => {
                                if self.forward(&frames, frame) {
                                    IngestState::Streaming(reader)
                                } else {
                                    tracing::info!("frame consumer closed, stopping ingestion");
                                    IngestState::Cancelled
                                }
                            }
                            Err(e) => self.connection_failed(e),
                        },
                    }
                }
                IngestState::Backoff => {
                    tracing::warn!("trying again in {} ms", self.reconnect_delay.as_millis());
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => IngestState::Cancelled,
                        _ = sleep(self.reconnect_delay) => IngestState::Connecting,
                    }
                }
                IngestState::Cancelled => break,
            };
        }

        tracing::info!("stream ingestion stopped");
    }

    fn connection_failed(&self, error: SourceError) -> IngestState {
        tracing::warn!(url = %self.url, "stream source connection failed: {}", error);
        self.metrics.record_source_reconnect();
        IngestState::Backoff
    }

    /// Returns `false` once the receiver is gone.
    fn forward(&self, frames: &mpsc::Sender<Frame>, frame: Frame) -> bool {
        self.metrics.record_frame_ingested();
        match frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("annotator busy, dropping frame");
                self.metrics.record_frame_dropped(DropStage::Ingest);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
