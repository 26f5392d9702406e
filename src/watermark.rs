//! Capture annotation
//!
//! Stamps an identifying label into a JPEG before it leaves the system,
//! as a COM (comment) segment inserted right after the SOI marker. The
//! image data itself is never decoded or re-encoded.
//!
//! The contract is lenient: anything that does not look like a JPEG (or
//! a label that cannot fit a COM segment) returns the original bytes
//! unchanged.

use bytes::Bytes;

/// JPEG start-of-image marker
const SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG comment segment marker
const COM: [u8; 2] = [0xFF, 0xFE];

/// Segment length field is 16-bit and counts itself
const MAX_LABEL_LEN: usize = u16::MAX as usize - 2;

/// Insert `label` as a comment segment after the SOI marker
///
/// Returns the original bytes when the input is not a JPEG or the label
/// does not fit a single COM segment.
pub fn stamp(image: &Bytes, label: &str) -> Bytes {
    if image.len() < SOI.len() || image[..SOI.len()] != SOI {
        tracing::warn!(bytes = image.len(), "not a JPEG, returning image unchanged");
        return image.clone();
    }

    let payload = label.as_bytes();
    if payload.len() > MAX_LABEL_LEN {
        tracing::warn!(label_bytes = payload.len(), "label too long for a comment segment");
        return image.clone();
    }

    let segment_len = (payload.len() + 2) as u16;
    let mut out = Vec::with_capacity(image.len() + 4 + payload.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&COM);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&image[SOI.len()..]);

    Bytes::from(out)
}
