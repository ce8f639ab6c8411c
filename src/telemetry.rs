use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

const LABELING_BUCKETS_MS: &[f64] = &[
    5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 75.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 2500.0,
];

/// Pipeline counters exported in the Prometheus text format.
pub struct Metrics {
    frames_ingested: IntCounter,
    frames_dropped: IntCounterVec,
    frames_published: IntCounter,
    labeling_failures: IntCounter,
    labeling_duration: Histogram,
    source_reconnects: IntCounter,
    active_subscribers: IntGauge,
    pub registry: Registry,
}

/// Pipeline stage at which a frame was discarded.
#[derive(Debug, Clone, Copy)]
pub enum DropStage {
    /// The annotator was still busy with the previous frame.
    Ingest,
    /// Labeling, decoding or re-encoding failed.
    Annotate,
}

impl DropStage {
    fn as_str(self) -> &'static str {
        match self {
            DropStage::Ingest => "ingest",
            DropStage::Annotate => "annotate",
        }
    }
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("mjpeg_labeler".into()), None)?;

        let frames_ingested =
            IntCounter::new("frames_ingested_total", "Frames read from the upstream source")?;
        let frames_dropped = IntCounterVec::new(
            Opts::new("frames_dropped_total", "Frames discarded before publishing"),
            &["stage"],
        )?;
        let frames_published = IntCounter::new(
            "frames_published_total",
            "Frames handed to the broadcaster",
        )?;
        let labeling_failures = IntCounter::new(
            "labeling_failures_total",
            "Frames whose labeling round trip or re-encoding failed",
        )?;
        let labeling_duration = Histogram::with_opts(
            HistogramOpts::new(
                "labeling_duration_ms",
                "Duration of labeling and annotation in milliseconds",
            )
            .buckets(LABELING_BUCKETS_MS.to_vec()),
        )?;
        let source_reconnects = IntCounter::new(
            "source_reconnects_total",
            "Connection failures on the upstream source",
        )?;
        let active_subscribers =
            IntGauge::new("active_subscribers", "Connected downstream clients")?;

        registry.register(Box::new(frames_ingested.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(frames_published.clone()))?;
        registry.register(Box::new(labeling_failures.clone()))?;
        registry.register(Box::new(labeling_duration.clone()))?;
        registry.register(Box::new(source_reconnects.clone()))?;
        registry.register(Box::new(active_subscribers.clone()))?;

        Ok(Metrics {
            frames_ingested,
            frames_dropped,
            frames_published,
            labeling_failures,
            labeling_duration,
            source_reconnects,
            active_subscribers,
            registry,
        })
    }

    pub fn record_frame_ingested(&self) {
        self.frames_ingested.inc();
    }

    pub fn record_frame_dropped(&self, stage: DropStage) {
        self.frames_dropped.with_label_values(&[stage.as_str()]).inc();
    }

    pub fn record_frame_published(&self) {
        self.frames_published.inc();
    }

    pub fn record_labeling_failure(&self) {
        self.labeling_failures.inc();
    }

    pub fn record_labeling_duration(&self, duration_ms: u64) {
        self.labeling_duration.observe(duration_ms as f64);
    }

    pub fn record_source_reconnect(&self) {
        self.source_reconnects.inc();
    }

    pub fn subscriber_connected(&self) {
        self.active_subscribers.inc();
    }

    pub fn subscriber_disconnected(&self) {
        self.active_subscribers.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(metrics: &Metrics) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_counters_are_exported_with_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.record_frame_ingested();
        metrics.record_frame_ingested();
        metrics.record_frame_dropped(DropStage::Annotate);

        let text = render(&metrics);

        assert!(text.contains("mjpeg_labeler_frames_ingested_total 2"));
        assert!(text.contains("mjpeg_labeler_frames_dropped_total{stage=\"annotate\"} 1"));
    }

    #[test]
    fn test_subscriber_gauge_tracks_connections() {
        let metrics = Metrics::new().unwrap();
        metrics.subscriber_connected();
        metrics.subscriber_connected();
        metrics.subscriber_disconnected();

        assert!(render(&metrics).contains("mjpeg_labeler_active_subscribers 1"));
    }

    #[test]
    fn test_independent_instances_do_not_collide() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_source_reconnect();

        assert!(render(&first).contains("mjpeg_labeler_source_reconnects_total 1"));
        assert!(render(&second).contains("mjpeg_labeler_source_reconnects_total 0"));
    }
}
