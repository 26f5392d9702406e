//! Event correlation
//!
//! The camera interleaves metadata parts and image parts on one stream;
//! the correlator pairs them back up. It holds at most one pending
//! metadata record: an image part consumes it, and anything else
//! (heartbeat, non-qualifying event, unknown content type) clears it.
//! Metadata is never reused across two images, and an image with no
//! pending metadata never becomes an event.

use std::collections::HashMap;

use crate::event::DetectionEvent;
use crate::protocol::constants::{
    CONTENT_TYPE_JPEG, CONTENT_TYPE_TEXT, EVENT_CODE_KEY, HEARTBEAT_MARKER, PLATE_NUMBER_KEY,
    UNKNOWN_PLATE,
};
use crate::protocol::multipart::ParsedPart;

/// Per-connection part-to-event correlator
#[derive(Debug)]
pub struct EventCorrelator {
    /// Address of the owning connection's device
    address: String,

    /// Event code that qualifies metadata as a plate detection
    event_code: String,

    /// Metadata waiting for its image part
    pending: Option<HashMap<String, String>>,

    /// Events emitted since connect
    events_emitted: u64,

    /// Images discarded for lack of pending metadata
    orphaned_images: u64,

    /// Heartbeats observed since connect
    heartbeats: u64,
}

impl EventCorrelator {
    /// Create a correlator for one connection
    pub fn new(address: impl Into<String>, event_code: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            event_code: event_code.into(),
            pending: None,
            events_emitted: 0,
            orphaned_images: 0,
            heartbeats: 0,
        }
    }

    /// Consume one parsed part, possibly completing an event
    pub fn ingest(&mut self, part: &ParsedPart) -> Option<DetectionEvent> {
        match part.content_type.as_deref() {
            Some(CONTENT_TYPE_TEXT) => {
                self.on_text(part);
                None
            }
            Some(CONTENT_TYPE_JPEG) => self.on_image(part),
            other => {
                tracing::debug!(
                    camera = %self.address,
                    content_type = ?other,
                    "skipping part with unhandled content type"
                );
                self.pending = None;
                None
            }
        }
    }

    fn on_text(&mut self, part: &ParsedPart) {
        let text = String::from_utf8_lossy(&part.body);
        let text = text.trim();

        if text.contains(HEARTBEAT_MARKER) {
            tracing::debug!(camera = %self.address, "heartbeat");
            self.heartbeats += 1;
            self.pending = None;
            return;
        }

        let fields = parse_event_text(text);
        match fields.get(EVENT_CODE_KEY) {
            Some(code) if *code == self.event_code => {
                self.pending = Some(fields);
            }
            other => {
                tracing::debug!(
                    camera = %self.address,
                    code = ?other,
                    "non-qualifying event"
                );
                self.pending = None;
            }
        }
    }

    fn on_image(&mut self, part: &ParsedPart) -> Option<DetectionEvent> {
        let Some(metadata) = self.pending.take() else {
            tracing::warn!(
                camera = %self.address,
                image_bytes = part.body.len(),
                "image part without pending metadata, discarding"
            );
            self.orphaned_images += 1;
            return None;
        };

        let plate = metadata
            .get(PLATE_NUMBER_KEY)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_PLATE.to_string());

        tracing::info!(
            camera = %self.address,
            plate = %plate,
            image_bytes = part.body.len(),
            "detection correlated"
        );
        self.events_emitted += 1;

        Some(DetectionEvent::new(
            plate,
            self.address.clone(),
            part.body.clone(),
            metadata,
        ))
    }

    /// Whether a metadata record is waiting for its image
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Events emitted since connect
    pub fn events_emitted(&self) -> u64 {
        self.events_emitted
    }

    /// Images discarded for lack of pending metadata since connect
    pub fn orphaned_images(&self) -> u64 {
        self.orphaned_images
    }

    /// Heartbeats observed since connect
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }
}

/// Decode newline-separated `key=value` lines, ignoring anything else
fn parse_event_text(text: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn text_part(body: &str) -> ParsedPart {
        ParsedPart {
            content_type: Some("text/plain".to_string()),
            declared_len: Some(body.len()),
            body: Bytes::from(body.to_string()),
        }
    }

    fn image_part(body: &'static [u8]) -> ParsedPart {
        ParsedPart {
            content_type: Some("image/jpeg".to_string()),
            declared_len: Some(body.len()),
            body: Bytes::from_static(body),
        }
    }

    const QUALIFYING: &str = "Events[0].EventBaseInfo.Code=TrafficJunction\r\n\
                              Events[0].TrafficCar.PlateNumber=ABC123";

    #[test]
    fn test_metadata_then_image_emits_event() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        assert!(correlator.ingest(&text_part(QUALIFYING)).is_none());
        assert!(correlator.has_pending());

        let event = correlator
            .ingest(&image_part(&[0xFF, 0xD8, 0xFF, 0xD9]))
            .expect("image after qualifying metadata should emit");

        assert_eq!(event.plate, "ABC123");
        assert_eq!(event.device_address, "cam");
        assert_eq!(event.image.as_ref(), &[0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(
            event.metadata_field("Events[0].EventBaseInfo.Code"),
            Some("TrafficJunction")
        );
        assert!(!correlator.has_pending());
        assert_eq!(correlator.events_emitted(), 1);
    }

    #[test]
    fn test_image_without_metadata_is_discarded() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        assert!(correlator.ingest(&image_part(&[1, 2, 3])).is_none());
        assert_eq!(correlator.orphaned_images(), 1);
        assert_eq!(correlator.events_emitted(), 0);
    }

    #[test]
    fn test_metadata_is_not_reused_across_images() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        correlator.ingest(&text_part(QUALIFYING));
        assert!(correlator.ingest(&image_part(&[1])).is_some());
        assert!(correlator.ingest(&image_part(&[2])).is_none());
        assert_eq!(correlator.orphaned_images(), 1);
    }

    #[test]
    fn test_heartbeat_clears_pending_and_never_qualifies() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        correlator.ingest(&text_part(QUALIFYING));
        assert!(correlator.has_pending());

        correlator.ingest(&text_part("Heartbeat"));
        assert!(!correlator.has_pending());
        assert_eq!(correlator.heartbeats(), 1);

        // An image right after a heartbeat has nothing to pair with
        assert!(correlator.ingest(&image_part(&[1, 2])).is_none());
    }

    #[test]
    fn test_non_qualifying_event_clears_pending() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        correlator.ingest(&text_part(QUALIFYING));
        correlator.ingest(&text_part("Events[0].EventBaseInfo.Code=FaceDetection"));
        assert!(!correlator.has_pending());
    }

    #[test]
    fn test_unknown_content_type_clears_pending() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        correlator.ingest(&text_part(QUALIFYING));
        let odd = ParsedPart {
            content_type: Some("application/octet-stream".to_string()),
            declared_len: None,
            body: Bytes::from_static(b"x"),
        };
        correlator.ingest(&odd);
        assert!(!correlator.has_pending());
    }

    #[test]
    fn test_missing_plate_field_uses_sentinel() {
        let mut correlator = EventCorrelator::new("cam", "TrafficJunction");

        correlator.ingest(&text_part("Events[0].EventBaseInfo.Code=TrafficJunction"));
        let event = correlator.ingest(&image_part(&[9])).unwrap();

        assert_eq!(event.plate, "UNKNOWN_PLATE");
    }

    #[test]
    fn test_parse_event_text_ignores_lines_without_equals() {
        let fields = parse_event_text("a=1\r\nnot a pair\r\nb = 2 ");

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("a").map(String::as_str), Some("1"));
        assert_eq!(fields.get("b").map(String::as_str), Some("2"));
    }
}
