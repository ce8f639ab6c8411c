use crate::broadcast::{Broadcaster, Subscriber};
use crate::frame::Frame;
use crate::telemetry::Metrics;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::{
    convert::Infallible,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Multipart writer state for one downstream connection.
#[derive(Debug, Clone)]
pub struct PartWriter {
    boundary: String,
    started_at: u64,
}

impl PartWriter {
    pub fn new() -> Self {
        Self::with_boundary(random_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            started_at: unix_timestamp(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/x-mixed-replace; boundary={}", self.boundary)
    }

    pub fn part(&self, frame: &Frame) -> Bytes {
        self.part_at(frame, unix_timestamp())
    }

    fn part_at(&self, frame: &Frame, timestamp: u64) -> Bytes {
        let part_header = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-StartTime: {}\r\nX-TimeStamp: {}\r\n\r\n",
            self.boundary,
            frame.len(),
            self.started_at,
            timestamp
        );
        let mut body = Vec::with_capacity(part_header.len() + frame.len() + 2);
        body.extend_from_slice(part_header.as_bytes());
        body.extend_from_slice(frame.as_ref());
        body.extend_from_slice(b"\r\n");
        Bytes::from(body)
    }

    pub fn closing(&self) -> Bytes {
        Bytes::from(format!("--{}--\r\n", self.boundary))
    }
}

impl Default for PartWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a subscriber registered for as long as its response body is alive.
///
/// Hyper drops the body when a write to the peer fails, which unsubscribes.
pub struct Subscription {
    subscriber: Subscriber,
    broadcaster: Arc<Broadcaster>,
    metrics: Arc<Metrics>,
}

impl Subscription {
    pub fn new(broadcaster: Arc<Broadcaster>, metrics: Arc<Metrics>) -> Self {
        let subscriber = broadcaster.subscribe();
        metrics.subscriber_connected();
        Self {
            subscriber,
            broadcaster,
            metrics,
        }
    }

    /// Body chunks for this connection: one multipart part per frame, then
    /// the closing delimiter once the broadcaster closes the slot.
    pub fn into_stream(
        self,
        writer: PartWriter,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> {
        stream::unfold(Some((self, writer)), |state| async move {
            let (mut subscription, writer) = state?;
            match subscription.subscriber.recv().await {
                Some(frame) => {
                    let part = writer.part(&frame);
                    Some((Ok(part), Some((subscription, writer))))
                }
                None => {
                    tracing::debug!("subscriber slot closed, ending stream");
                    Some((Ok(writer.closing()), None))
                }
            }
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.subscriber.id());
        self.metrics.subscriber_disconnected();
    }
}

fn random_boundary() -> String {
    let bytes: [u8; 30] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
