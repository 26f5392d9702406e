//! Camera wire protocol
//!
//! Everything that touches bytes on the wire: the incremental multipart
//! stream parser, the digest authentication exchange, and the protocol
//! constants shared by both.
//!
//! # Stream anatomy
//!
//! ```text
//!   GET /cgi-bin/snapManager.cgi?action=attachFileProc&…
//!                  │
//!                  ▼
//!   200 OK  Content-Type: multipart/x-mixed-replace; boundary=<token>
//!                  │
//!                  ▼
//!   ┌─ text/plain  part ──┐  metadata: key=value lines
//!   ├─ image/jpeg  part ──┤  capture matching the metadata
//!   ├─ text/plain  part ──┤  heartbeat (keep-alive)
//!   ├─ …                  │
//!   └─ --<token>-- ───────┘  terminal marker, clean end of stream
//! ```
//!
//! The parser never sees the HTTP layer; it receives raw body chunks and
//! the boundary token extracted from the response content type.

pub mod constants;
pub mod digest;
pub mod multipart;

pub use digest::{get_with_digest, DigestChallenge};
pub use multipart::{boundary_from_content_type, MultipartParser, ParsedPart, Step};
