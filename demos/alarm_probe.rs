//! One-shot alarm output probe
//!
//! Run with: cargo run --example alarm_probe <CAMERA_ADDR> <CHANNEL>
//!
//! Examples:
//!   cargo run --example alarm_probe 192.168.1.106 0
//!   PLATEGATE_USERNAME=admin PLATEGATE_PASSWORD=secret \
//!     cargo run --example alarm_probe 192.168.1.106 1
//!
//! Prints ACTIVE or INACTIVE and exits with status 0/1 accordingly. Any
//! failure reads as INACTIVE; the probe is fail-closed.

use plategate::camera::alarm;
use plategate::CameraConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(address), Some(channel)) = (args.next(), args.next()) else {
        eprintln!("usage: alarm_probe <CAMERA_ADDR> <CHANNEL>");
        std::process::exit(2);
    };
    let Ok(channel) = channel.parse::<u32>() else {
        eprintln!("channel must be a bit index, got '{}'", channel);
        std::process::exit(2);
    };

    let mut config = CameraConfig::new(address.clone()).alarm_channel(channel);
    if let (Ok(user), Ok(pass)) = (
        std::env::var("PLATEGATE_USERNAME"),
        std::env::var("PLATEGATE_PASSWORD"),
    ) {
        config = config.credentials(user, pass);
    }

    let active = alarm::probe(&config).await;
    println!(
        "{} channel {}: {}",
        address,
        channel,
        if active { "ACTIVE" } else { "INACTIVE" }
    );
    std::process::exit(if active { 0 } else { 1 });
}
