//! End-to-end tests against a scripted local HTTP server
//!
//! The server speaks just enough HTTP/1.1 to stand in for a camera: it
//! answers the streaming GET with a canned multipart body, the alarm GET
//! with a `result=` line, and optionally demands digest authentication
//! first. Everything flows through the real client stack.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use plategate::camera::alarm;
use plategate::{CameraConfig, CameraFleet, TelegramNotifier};

const METADATA: &[u8] = b"Events[0].EventBaseInfo.Code=TrafficJunction\r\n\
Events[0].TrafficCar.PlateNumber=ABC123";
const METADATA_2: &[u8] = b"Events[0].EventBaseInfo.Code=TrafficJunction\r\n\
Events[0].TrafficCar.PlateNumber=XYZ789";
const JPEG: &[u8] = &[0xFF, 0xD8, 0x00, 0x01, 0x02, 0x03, 0xFF, 0xD9];
const JPEG_2: &[u8] = &[0xFF, 0xD8, 0x09, 0x08, 0x07, 0xFF, 0xD9];

/// Read one request head (through the blank line); returns it as text
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Read a full request including a Content-Length body
async fn read_request_with_body(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut body_len = None;
    let mut head_end = None;

    loop {
        if let (Some(head_end), Some(body_len)) = (head_end, body_len) {
            if buf.len() >= head_end + body_len {
                break;
            }
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if head_end.is_none() {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                head_end = Some(pos + 4);
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                body_len = Some(
                    head.lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.trim()
                                .eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0),
                );
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

/// One multipart part with a declared length
fn sized_part(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"--myboundary\r\n");
    out.extend_from_slice(
        format!(
            "Content-Type: {}\r\nContent-Length: {}\r\n\r\n",
            content_type,
            body.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
    out
}

/// Response head for the event stream (close-delimited body)
fn stream_head() -> &'static [u8] {
    b"HTTP/1.1 200 OK\r\n\
      Content-Type: multipart/x-mixed-replace; boundary=myboundary\r\n\
      Connection: close\r\n\r\n"
}

/// Plain-text response with a body
fn text_response(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Spawn a server answering every request with the same body
async fn spawn_text_server(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let _ = socket.write_all(&text_response(body)).await;
            });
        }
    });
    addr
}

fn test_config(addr: SocketAddr) -> CameraConfig {
    CameraConfig::new(addr.to_string())
        .connect_timeout(Duration::from_secs(2))
        .backoff(Duration::from_secs(3600), Duration::from_secs(3600))
}

#[tokio::test]
async fn fleet_drains_detections_in_emission_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut socket).await;

        let mut body = stream_head().to_vec();
        body.extend(sized_part("text/plain", b"Heartbeat"));
        body.extend(sized_part("text/plain", METADATA));
        body.extend(sized_part("image/jpeg", JPEG));
        body.extend(sized_part("text/plain", METADATA_2));
        body.extend(sized_part("image/jpeg", JPEG_2));
        socket.write_all(&body).await.unwrap();
        socket.flush().await.unwrap();

        // Hold the stream open so the connection stays in Streaming.
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let fleet = CameraFleet::new([test_config(addr)]).stop_timeout(Duration::from_secs(2));
    fleet.start();

    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while events.len() < 2 && Instant::now() < deadline {
        events.extend(fleet.drain(10, Duration::from_millis(500)).await);
    }

    assert_eq!(events.len(), 2, "expected both detections");
    assert_eq!(events[0].plate, "ABC123");
    assert_eq!(events[0].image.as_ref(), JPEG);
    assert_eq!(events[0].device_address, addr.to_string());
    assert_eq!(
        events[0].metadata_field("Events[0].EventBaseInfo.Code"),
        Some("TrafficJunction")
    );
    assert_eq!(events[1].plate, "XYZ789");
    assert_eq!(events[1].image.as_ref(), JPEG_2);

    // Stop while the connection is mid-stream; it must still terminate.
    fleet.stop().await;
    assert_eq!(fleet.connections_alive(), 0);
}

#[tokio::test]
async fn digest_challenge_is_answered_on_retry() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        // First request: challenge and close.
        let (mut socket, _) = listener.accept().await.unwrap();
        let first = read_request(&mut socket).await;
        seen_tx.send(first).unwrap();
        socket
            .write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  WWW-Authenticate: Digest realm=\"Login to cam\", nonce=\"5a1b2c3d\", qop=\"auth\"\r\n\
                  Content-Length: 0\r\n\
                  Connection: close\r\n\r\n",
            )
            .await
            .unwrap();
        drop(socket);

        // Second request: must carry the Authorization header.
        let (mut socket, _) = listener.accept().await.unwrap();
        let second = read_request(&mut socket).await;
        seen_tx.send(second).unwrap();

        let mut body = stream_head().to_vec();
        body.extend(sized_part("text/plain", METADATA));
        body.extend(sized_part("image/jpeg", JPEG));
        socket.write_all(&body).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let config = test_config(addr).credentials("admin", "secret");
    let fleet = CameraFleet::new([config]).stop_timeout(Duration::from_secs(2));
    fleet.start();

    let events = fleet.drain(10, Duration::from_secs(5)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].plate, "ABC123");

    // Header names may reach the wire in any case
    let first = seen_rx.recv().await.unwrap().to_ascii_lowercase();
    assert!(
        !first.contains("authorization:"),
        "first request must be unauthenticated"
    );
    let second = seen_rx.recv().await.unwrap();
    assert!(second.to_ascii_lowercase().contains("authorization: digest"));
    assert!(second.contains("username=\"admin\""));
    assert!(second.contains("realm=\"Login to cam\""));
    assert!(second.contains("qop=auth"));
    assert!(second.contains("response=\""));

    fleet.stop().await;
}

#[tokio::test]
async fn fleet_probe_tests_configured_bit() {
    // 6 = 0b110: channel 1 active, channel 0 not. The same server also
    // answers the streaming GET (with a useless body), which only sends
    // the connection into backoff; the probe path is independent.
    let addr = spawn_text_server("result=6").await;

    let active = CameraFleet::new([test_config(addr).alarm_channel(1)]);
    active.start();
    assert!(active.probe(&addr.to_string()).await);
    assert!(!active.probe("10.9.9.9").await, "unknown address");
    active.stop().await;

    let inactive = CameraFleet::new([test_config(addr).alarm_channel(0)]);
    inactive.start();
    assert!(!inactive.probe(&addr.to_string()).await);
    inactive.stop().await;
}

#[tokio::test]
async fn probe_fails_closed_on_malformed_responses() {
    for body in ["flagrant nonsense", "result=notanumber", "result=", ""] {
        let addr = spawn_text_server(Box::leak(body.to_string().into_boxed_str())).await;
        let config = CameraConfig::new(addr.to_string())
            .alarm_channel(1)
            .probe_timeout(Duration::from_secs(2));

        assert!(
            !alarm::probe(&config).await,
            "body {:?} must read as inactive",
            body
        );
    }
}

#[tokio::test]
async fn probe_network_failure_is_inactive() {
    // Connection refused: nothing listens on the port we just released.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = CameraConfig::new(addr.to_string())
        .alarm_channel(1)
        .probe_timeout(Duration::from_secs(2));
    assert!(!alarm::probe(&config).await);
}

#[tokio::test]
async fn probe_unconfigured_channel_makes_no_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let contacted = Arc::new(AtomicBool::new(false));

    let flag = contacted.clone();
    tokio::spawn(async move {
        if listener.accept().await.is_ok() {
            flag.store(true, Ordering::Release);
        }
    });

    // No alarm_channel configured
    let config = CameraConfig::new(addr.to_string());
    assert!(!alarm::probe(&config).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!contacted.load(Ordering::Acquire), "probe must not touch the network");
}

#[tokio::test]
async fn stop_from_backoff_honors_bound() {
    // Refused connection sends the task straight into a huge backoff.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fleet = CameraFleet::new([test_config(addr)]).stop_timeout(Duration::from_secs(2));
    fleet.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fleet.connections_alive(), 1);

    let started = Instant::now();
    fleet.stop().await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(fleet.connections_alive(), 0);
}

#[tokio::test]
async fn notifier_posts_photo_to_api() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request_with_body(&mut socket).await;
        seen_tx.send(request).unwrap();
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
    });

    let notifier =
        TelegramNotifier::new("123456:token").api_base(format!("http://{}", addr));
    let delivered = notifier
        .send_detection("814158826", "Plate ABC123 at the gate.", Some(JPEG))
        .await;
    assert!(delivered);

    let request = seen_rx.recv().await.unwrap();
    assert!(request.contains("POST /bot123456:token/sendPhoto"));
    assert!(request.contains("814158826"));
    assert!(request.contains("plate.jpg"));
    // MarkdownV2 escaping applied to the caption
    assert!(request.contains("at the gate\\."));
}
