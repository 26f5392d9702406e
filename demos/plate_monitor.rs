//! Plate monitoring demo with VIP notification
//!
//! Run with: cargo run --example plate_monitor <CAMERA_ADDR> [CAMERA_ADDR...]
//!
//! Examples:
//!   cargo run --example plate_monitor 192.168.1.106
//!   cargo run --example plate_monitor 192.168.1.106 192.168.1.107
//!
//! Environment:
//!   PLATEGATE_USERNAME / PLATEGATE_PASSWORD  camera credentials (digest)
//!   PLATEGATE_ALARM_CHANNEL                  alarm output bit index
//!   PLATEGATE_VIP_CSV                        VIP list path (default vip_list.csv)
//!   TELEGRAM_BOT_TOKEN                       bot token (empty = delivery disabled)
//!   RUST_LOG                                 log filter (default info)
//!
//! ## Flow
//!
//! Detections drain from the fleet queue. Plates on the VIP list trigger
//! an alarm-output poll on the originating camera; an active output is the
//! permission to notify, so the stamped capture goes out to the record's
//! chat only then.

use std::time::Duration;

use plategate::{notify, watermark, CameraConfig, CameraFleet, TelegramNotifier, VipRegistry};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addresses: Vec<String> = std::env::args().skip(1).collect();
    if addresses.is_empty() {
        eprintln!("usage: plate_monitor <CAMERA_ADDR> [CAMERA_ADDR...]");
        std::process::exit(1);
    }

    let username = std::env::var("PLATEGATE_USERNAME").ok();
    let password = std::env::var("PLATEGATE_PASSWORD").ok();
    let alarm_channel = std::env::var("PLATEGATE_ALARM_CHANNEL")
        .ok()
        .and_then(|v| v.parse::<u32>().ok());

    let configs: Vec<CameraConfig> = addresses
        .iter()
        .map(|addr| {
            let mut config = CameraConfig::new(addr.clone());
            if let (Some(user), Some(pass)) = (&username, &password) {
                config = config.credentials(user.clone(), pass.clone());
            }
            if let Some(channel) = alarm_channel {
                config = config.alarm_channel(channel);
            }
            config
        })
        .collect();

    let vip_path =
        std::env::var("PLATEGATE_VIP_CSV").unwrap_or_else(|_| "vip_list.csv".to_string());
    let vip = VipRegistry::load(vip_path);
    let notifier = TelegramNotifier::new(std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default());

    let fleet = CameraFleet::new(configs);
    fleet.start();
    println!(
        "Monitoring {} camera(s), {} VIP record(s) loaded, notifications {}",
        fleet.len(),
        vip.len(),
        if notifier.is_enabled() { "enabled" } else { "disabled" },
    );

    let mut total_detections = 0u64;
    loop {
        let events = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            events = fleet.drain(10, Duration::from_millis(500)) => events,
        };

        if events.is_empty() {
            continue;
        }

        for event in events {
            total_detections += 1;
            println!(
                "[{}] plate {} from {} ({} bytes)",
                total_detections,
                event.plate,
                event.device_address,
                event.image_len(),
            );

            let Some(record) = vip.lookup(&event.plate) else {
                continue;
            };

            // An energized gate output is the permission to notify.
            if !fleet.probe_within(&event.device_address).await {
                println!(
                    "  VIP {} seen but gate output stayed inactive, not notifying",
                    record.owner_name
                );
                continue;
            }

            let caption = notify::format_caption(&event, record);
            let stamped = watermark::stamp(&event.image, "PLATEGATE");
            let delivered = notifier
                .send_detection(&record.chat_id, &caption, Some(&stamped))
                .await;
            println!(
                "  VIP {} notified at chat {}: {}",
                record.owner_name,
                record.chat_id,
                if delivered { "ok" } else { "FAILED" },
            );
        }

        println!(
            "alive connections: {}/{}",
            fleet.connections_alive(),
            fleet.len()
        );
    }

    println!("Shutting down...");
    fleet.stop().await;
    println!("Done. {} detection(s) total.", total_detections);
}
