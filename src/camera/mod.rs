//! Per-device streaming and probing
//!
//! One [`CameraConnection`] per device: it owns the persistent streaming
//! request, the incremental parser, and the correlator, and it implements
//! the reconnect/backoff lifecycle. The [`alarm`] module probes the
//! device's digital alarm outputs on demand, independently of the stream.

pub mod alarm;
pub mod config;
pub mod connection;
pub mod correlator;

pub use config::{CameraConfig, Credentials};
pub use connection::{CameraConnection, ConnectionState};
pub use correlator::EventCorrelator;
