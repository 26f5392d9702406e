//! Detection events
//!
//! A [`DetectionEvent`] is the unit handed to consumers: one recognized
//! plate paired with the JPEG the camera captured for it. Events are
//! immutable once constructed and cheap to clone; the image payload is
//! reference-counted `Bytes`, not copied.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A correlated plate detection from one camera
///
/// The capture instant is the wall-clock time at which the image part
/// finished assembling on the receiving side, not any camera-reported
/// time. Camera clocks drift; the receiver's clock is the one the rest of
/// the application reasons about.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    /// Recognized plate identifier
    pub plate: String,

    /// Wall-clock time when the image part completed assembly
    pub captured_at: DateTime<Utc>,

    /// Address of the originating device (stable key)
    pub device_address: String,

    /// JPEG payload (zero-copy via reference counting)
    pub image: Bytes,

    /// Raw key/value lines from the metadata part
    pub metadata: HashMap<String, String>,
}

impl DetectionEvent {
    /// Create an event stamped with the current processing time
    pub fn new(
        plate: impl Into<String>,
        device_address: impl Into<String>,
        image: Bytes,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            plate: plate.into(),
            captured_at: Utc::now(),
            device_address: device_address.into(),
            image,
            metadata,
        }
    }

    /// Look up a raw metadata field
    pub fn metadata_field(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Size of the image payload in bytes
    pub fn image_len(&self) -> usize {
        self.image.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_construction() {
        let mut metadata = HashMap::new();
        metadata.insert("Events[0].TrafficCar.PlateNumber".to_string(), "ABC123".to_string());

        let event = DetectionEvent::new(
            "ABC123",
            "192.168.1.106",
            Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            metadata,
        );

        assert_eq!(event.plate, "ABC123");
        assert_eq!(event.device_address, "192.168.1.106");
        assert_eq!(event.image_len(), 4);
        assert_eq!(
            event.metadata_field("Events[0].TrafficCar.PlateNumber"),
            Some("ABC123")
        );
        assert_eq!(event.metadata_field("missing"), None);
    }

    #[test]
    fn test_clone_shares_image_payload() {
        let event = DetectionEvent::new("X", "cam", Bytes::from(vec![0u8; 1024]), HashMap::new());
        let copy = event.clone();

        // Bytes clones share the underlying allocation
        assert_eq!(copy.image.as_ptr(), event.image.as_ptr());
    }
}
