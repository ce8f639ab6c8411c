use bytes::Bytes;
use serde::Deserialize;

/// Detections below this confidence are never drawn.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// One JPEG-encoded image. Immutable once built; clones share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// Builds a frame that owns a fresh copy of `data`.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(buf: Vec<u8>) -> Self {
        Self(Bytes::from(buf))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Response body of the labeling service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabelResult {
    #[serde(rename = "x")]
    pub reference_width: f64,
    #[serde(rename = "y")]
    pub reference_height: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub detections: Vec<Detection>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Detection>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Detection>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A labeled box, normalized against the reference size of its [`LabelResult`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Detection {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "p")]
    pub confidence: f64,
    #[serde(rename = "x")]
    pub center_x: f64,
    #[serde(rename = "y")]
    pub center_y: f64,
    #[serde(rename = "w")]
    pub width: f64,
    #[serde(rename = "h")]
    pub height: f64,
}

/// Pixel corners of a detection, truncated toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Detection {
    pub fn is_confident(&self) -> bool {
        self.confidence >= MIN_CONFIDENCE
    }

    pub fn pixel_rect(&self, reference_width: f64, reference_height: f64) -> PixelRect {
        let cx = reference_width * self.center_x;
        let cy = reference_height * self.center_y;
        let half_w = reference_width * self.width / 2.0;
        let half_h = reference_height * self.height / 2.0;

        PixelRect {
            x1: (cx - half_w) as i32,
            y1: (cy - half_h) as i32,
            x2: (cx + half_w) as i32,
            y2: (cy + half_h) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_result_from_service_json() {
        let body = r#"{
            "x": 640, "y": 480,
            "detections": [
                {"label": "person", "p": 0.93, "x": 0.5, "y": 0.25, "w": 0.1, "h": 0.2}
            ]
        }"#;

        let result: LabelResult = serde_json::from_str(body).unwrap();

        assert_eq!(result.reference_width, 640.0);
        assert_eq!(result.reference_height, 480.0);
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].label, "person");
        assert_eq!(result.detections[0].confidence, 0.93);
    }

    #[test]
    fn test_missing_detections_is_empty() {
        let result: LabelResult = serde_json::from_str(r#"{"x": 1, "y": 1}"#).unwrap();
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_null_detections_is_empty() {
        let result: LabelResult =
            serde_json::from_str(r#"{"x": 640, "y": 480, "detections": null}"#).unwrap();
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_detection_without_label_parses() {
        let result: LabelResult = serde_json::from_str(
            r#"{"x": 1, "y": 1, "detections": [{"p": 0.7, "x": 0.5, "y": 0.5, "w": 0.1, "h": 0.1}]}"#,
        )
        .unwrap();
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].label, "");
    }

    #[test]
    fn test_confidence_boundary_is_inclusive() {
        let mut detection = Detection {
            label: String::new(),
            confidence: 0.5,
            center_x: 0.5,
            center_y: 0.5,
            width: 0.2,
            height: 0.2,
        };
        assert!(detection.is_confident());

        detection.confidence = 0.4999999;
        assert!(!detection.is_confident());
    }

    #[test]
    fn test_pixel_rect_truncates_toward_zero() {
        let detection = Detection {
            label: "cat".into(),
            confidence: 0.9,
            center_x: 0.5,
            center_y: 0.5,
            width: 0.2,
            height: 0.2,
        };
        assert_eq!(
            detection.pixel_rect(100.0, 100.0),
            PixelRect {
                x1: 40,
                y1: 40,
                x2: 60,
                y2: 60
            }
        );

        let offside = Detection {
            center_x: 0.0,
            width: 0.15,
            ..detection
        };
        // -7.5 truncates to -7, not -8
        assert_eq!(offside.pixel_rect(100.0, 100.0).x1, -7);
        assert_eq!(offside.pixel_rect(100.0, 100.0).x2, 7);
    }

    #[test]
    fn test_copy_from_slice_owns_its_buffer() {
        let source = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let frame = Frame::copy_from_slice(&source);
        assert_eq!(frame.as_ref(), source.as_slice());
        assert_ne!(frame.as_ref().as_ptr(), source.as_ptr());
    }
}
