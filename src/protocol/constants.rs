//! Protocol constants
//!
//! Wire-level markers and device endpoint defaults. The endpoint paths and
//! query parameters are fixed by the camera firmware's CGI interface.

use std::time::Duration;

/// Line terminator inside part header blocks
pub const CRLF: &[u8] = b"\r\n";

/// Blank line separating a part's header block from its body
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Prefix prepended to the boundary token on the wire
pub const BOUNDARY_PREFIX: &[u8] = b"--";

/// Suffix after the final boundary marking clean end of stream
pub const TERMINAL_SUFFIX: &[u8] = b"--";

/// Content type of metadata parts
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Content type of image parts
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";

/// Metadata key carrying the event code
pub const EVENT_CODE_KEY: &str = "Events[0].EventBaseInfo.Code";

/// Metadata key carrying the recognized plate
pub const PLATE_NUMBER_KEY: &str = "Events[0].TrafficCar.PlateNumber";

/// Plate sentinel when the metadata part lacks a plate field
pub const UNKNOWN_PLATE: &str = "UNKNOWN_PLATE";

/// Substring marking a keep-alive part
pub const HEARTBEAT_MARKER: &str = "Heartbeat";

/// Event code identifying a plate detection among other event types
pub const DEFAULT_EVENT_CODE: &str = "TrafficJunction";

/// CGI path of the streaming event endpoint
pub const SNAP_MANAGER_PATH: &str = "/cgi-bin/snapManager.cgi";

/// CGI path + query of the alarm output status endpoint
pub const ALARM_STATE_PATH: &str = "/cgi-bin/alarm.cgi?action=getOutState";

/// Default video channel requested from the device
pub const DEFAULT_CHANNEL: u32 = 1;

/// Default heartbeat interval requested from the device, in seconds
pub const DEFAULT_HEARTBEAT_SECS: u32 = 15;

/// TCP connect timeout for the streaming request
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-chunk read timeout on the event stream
///
/// Must exceed the heartbeat interval, or healthy idle streams would be
/// torn down between heartbeats.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Total timeout for one alarm probe request
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Window for the polling probe variant
pub const DEFAULT_PROBE_WINDOW: Duration = Duration::from_secs(2);

/// Pause between attempts for the polling probe variant
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Backoff after a transient network failure
pub const SHORT_BACKOFF: Duration = Duration::from_secs(30);

/// Backoff after an unclassified internal fault
pub const LONG_BACKOFF: Duration = Duration::from_secs(60);

/// How long the fleet waits for each connection to stop
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
