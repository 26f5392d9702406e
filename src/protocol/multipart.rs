//! Incremental multipart stream parser
//!
//! Cameras deliver events as an unterminated `multipart/x-mixed-replace`
//! HTTP body: an endless alternation of `text/plain` metadata parts and
//! `image/jpeg` capture parts, separated by a boundary token declared in
//! the response content type. Network reads hand us arbitrary chunks, so
//! the parser accumulates bytes and yields a part only once it is complete.
//!
//! ```text
//! --myboundary\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: 57\r\n
//! \r\n
//! Events[0].EventBaseInfo.Code=TrafficJunction\r\n...
//! --myboundary\r\n
//! Content-Type: image/jpeg\r\n
//! ...
//! --myboundary--          <- terminal marker, clean end of stream
//! ```
//!
//! Two framing modes exist on the wire:
//!
//! - **Declared length**: the part carries `Content-Length`; the body is
//!   exactly that many bytes after the blank line.
//! - **Boundary scan**: no length; the body runs until the next boundary
//!   occurrence. This inherits a protocol limitation: a body that happens
//!   to contain the boundary byte sequence is truncated at it. The wire
//!   format defines no escaping, so the parser does not invent any.
//!
//! Parser state is fully captured by the buffer plus the boundary token:
//! feeding the same byte stream in different chunk sizes yields the same
//! part sequence.

use bytes::{Buf, Bytes, BytesMut};

use crate::protocol::constants::{BOUNDARY_PREFIX, CRLF, HEADER_TERMINATOR, TERMINAL_SUFFIX};

/// One complete part extracted from the stream
#[derive(Debug, Clone)]
pub struct ParsedPart {
    /// Value of the part's `Content-Type` header, if present
    pub content_type: Option<String>,

    /// Value of the part's `Content-Length` header, if present and valid
    pub declared_len: Option<usize>,

    /// Part body (zero-copy slice of the receive buffer)
    pub body: Bytes,
}

/// Outcome of one extraction attempt
#[derive(Debug)]
pub enum Step {
    /// No complete part in the buffer yet; push more data
    NeedMore,
    /// One complete part was extracted
    Part(ParsedPart),
    /// The terminal boundary marker was seen; the stream ended cleanly
    EndOfStream,
}

/// Incremental parser for one connection's event stream
///
/// Owns its receive buffer; the owning connection pushes every network
/// chunk and then drains parts until [`Step::NeedMore`].
#[derive(Debug)]
pub struct MultipartParser {
    /// Boundary token as it appears on the wire (`--` + token)
    delimiter: Vec<u8>,

    /// Accumulated, not-yet-consumed stream bytes
    buffer: BytesMut,
}

impl MultipartParser {
    /// Create a parser for the given boundary token (without the `--`
    /// wire prefix)
    pub fn new(boundary_token: &str) -> Self {
        let mut delimiter = Vec::with_capacity(BOUNDARY_PREFIX.len() + boundary_token.len());
        delimiter.extend_from_slice(BOUNDARY_PREFIX);
        delimiter.extend_from_slice(boundary_token.as_bytes());

        Self {
            delimiter,
            buffer: BytesMut::new(),
        }
    }

    /// Append a network chunk to the receive buffer
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes currently buffered and not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Try to extract the next complete part
    ///
    /// Call repeatedly after each [`push`](Self::push) until it returns
    /// [`Step::NeedMore`].
    pub fn next_part(&mut self) -> Step {
        let Some(start) = find(&self.buffer, &self.delimiter) else {
            return Step::NeedMore;
        };
        let after = start + self.delimiter.len();

        // Not enough bytes yet to tell a terminal marker from a part header.
        if self.buffer.len() < after + TERMINAL_SUFFIX.len() {
            return Step::NeedMore;
        }

        if &self.buffer[after..after + TERMINAL_SUFFIX.len()] == TERMINAL_SUFFIX {
            tracing::debug!("terminal boundary marker, stream ended cleanly");
            self.buffer.clear();
            return Step::EndOfStream;
        }

        // The header block starts past the CRLF ending the boundary line.
        // The length check above guarantees `header_start <= buffer.len()`.
        let header_start = after + CRLF.len();
        let Some(rel) = find(&self.buffer[header_start..], HEADER_TERMINATOR) else {
            return Step::NeedMore;
        };
        let header_end = header_start + rel;
        let (content_type, declared_len) = parse_part_headers(&self.buffer[header_start..header_end]);
        let body_start = header_end + HEADER_TERMINATOR.len();

        match declared_len {
            Some(len) => {
                // Body is exactly `len` bytes after the blank line. The
                // subtraction form cannot overflow on absurd lengths.
                if self.buffer.len().saturating_sub(body_start) < len {
                    return Step::NeedMore;
                }
                self.buffer.advance(body_start);
                let body = self.buffer.split_to(len).freeze();
                Step::Part(ParsedPart {
                    content_type,
                    declared_len,
                    body,
                })
            }
            None => {
                // No declared length: the body runs to the next boundary.
                let Some(rel_next) = find(&self.buffer[body_start..], &self.delimiter) else {
                    return Step::NeedMore;
                };
                self.buffer.advance(body_start);
                let body = self.buffer.split_to(rel_next).freeze();
                Step::Part(ParsedPart {
                    content_type,
                    declared_len: None,
                    body,
                })
            }
        }
    }
}

/// Extract the boundary token from a `Content-Type` header value
///
/// Returns `None` if the header declares no boundary.
pub fn boundary_from_content_type(value: &str) -> Option<String> {
    let (_, raw) = value.split_once("boundary=")?;
    let token = raw.trim().trim_matches('"');
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Parse a part's header block into (content type, declared length)
///
/// Unknown headers are skipped; an unparseable `Content-Length` value is
/// ignored, reverting the part to boundary-scan framing.
fn parse_part_headers(raw: &[u8]) -> (Option<String>, Option<usize>) {
    let text = String::from_utf8_lossy(raw);
    let mut content_type = None;
    let mut declared_len = None;

    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "content-type" {
            content_type = Some(value.to_string());
        } else if name == "content-length" {
            match value.parse::<usize>() {
                Ok(len) => declared_len = Some(len),
                Err(_) => {
                    tracing::warn!(value = value, "unparseable Content-Length, scanning for boundary instead");
                }
            }
        }
    }

    (content_type, declared_len)
}

/// First occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
