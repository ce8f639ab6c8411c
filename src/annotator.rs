use crate::broadcast::Broadcaster;
use crate::codec::{CodecError, FrameCodec, JpegCodec};
use crate::config::Config;
use crate::font::{BitmapFont, DrawText};
use crate::frame::{Frame, LabelResult};
use crate::overlay::Overlay;
use crate::telemetry::{DropStage, Metrics};
use image::Rgb;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use std::{sync::Arc, time::Duration, time::Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to build labeling client: {0}")]
    ClientBuildFailed(reqwest::Error),
    #[error("Labeling request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Labeling service answered with status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("Failed to parse labeling response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// HTTP client for the external labeling service.
pub struct LabelingClient {
    client: Client,
    url: String,
}

impl LabelingClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AnnotateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AnnotateError::ClientBuildFailed)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Posts the JPEG as a single `image/jpeg` form part and parses the detections.
    pub async fn label(&self, frame: &Frame) -> Result<LabelResult, AnnotateError> {
        let part = Part::bytes(frame.as_ref().to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("image", part);

        let response = self.client.post(&self.url).multipart(form).send().await?;
        if response.status() != StatusCode::OK {
            return Err(AnnotateError::UnexpectedStatus(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turns raw upstream frames into the frames that get broadcast.
///
/// Without a labeling service this is a copy. With one, every frame costs a
/// labeling round trip plus a decode/draw/encode cycle, and any failure along
/// the way drops that frame only.
pub struct Annotator<C = JpegCodec, F = BitmapFont> {
    labeler: Option<LabelingClient>,
    codec: C,
    overlay: Overlay<F>,
    metrics: Arc<Metrics>,
}

impl Annotator {
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self, AnnotateError> {
        let labeler = config
            .labeler
            .endpoint()
            .map(|url| LabelingClient::new(url, config.labeler.get_timeout()))
            .transpose()?;
        match config.labeler.endpoint() {
            Some(url) => tracing::info!(url, "annotating frames with labeling service"),
            None => tracing::info!("no labeling service configured, frames pass through"),
        }

        Ok(Self::new(
            labeler,
            JpegCodec::new(config.overlay.jpeg_quality),
            Overlay::new(Rgb(config.overlay.color), BitmapFont),
            metrics,
        ))
    }
}

impl<C: FrameCodec, F: DrawText> Annotator<C, F> {
    pub fn new(
        labeler: Option<LabelingClient>,
        codec: C,
        overlay: Overlay<F>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            labeler,
            codec,
            overlay,
            metrics,
        }
    }

    /// Returns the frame to publish, or `None` when this frame has to be dropped.
    pub async fn process(&self, frame: &Frame) -> Option<Frame> {
        let Some(labeler) = &self.labeler else {
            return Some(Frame::copy_from_slice(frame.as_ref()));
        };

        let started = Instant::now();
        match self.annotate(labeler, frame).await {
            Ok(annotated) => {
                self.metrics
                    .record_labeling_duration(started.elapsed().as_millis() as u64);
                Some(annotated)
            }
            Err(e) => {
                tracing::warn!("failed to label image: {}", e);
                self.metrics.record_labeling_failure();
                self.metrics.record_frame_dropped(DropStage::Annotate);
                None
            }
        }
    }

    #[instrument(skip_all, fields(frame_len = frame.len()))]
    async fn annotate(
        &self,
        labeler: &LabelingClient,
        frame: &Frame,
    ) -> Result<Frame, AnnotateError> {
        let labels = labeler.label(frame).await?;
        let mut image = self.codec.decode(frame.as_ref())?;
        tracing::debug!(
            detections = labels.detections.len(),
            "drawing labeling results"
        );
        self.overlay.draw(
            &mut image,
            labels.reference_width,
            labels.reference_height,
            &labels.detections,
        );
        Ok(Frame::from(self.codec.encode(&image)?))
    }

    /// Consumes frames until shutdown, publishing each processed frame.
    pub async fn run(
        self,
        mut frames: mpsc::Receiver<Frame>,
        broadcaster: Arc<Broadcaster>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let processed = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                processed = self.process(&frame) => processed,
            };

            if let Some(processed) = processed {
                let delivered = broadcaster.publish(&processed);
                self.metrics.record_frame_published();
                tracing::trace!(delivered, "published frame");
            }
        }

        tracing::info!("annotator stopped");
    }
}
