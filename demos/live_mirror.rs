//! Live Mirror Demo - follows a bay occupancy feed and prints what changes.
//!
//! Usage: cargo run --example live_mirror -- ws://localhost:8080/ws
//!
//! Stop the server to watch the retry sequence and offline drift kick in.

use std::time::Duration;

use slot_mirror::{DriftConfig, MirrorClient, MirrorConfig, OpsEvent};
use tokio::time::interval;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,slot_mirror=debug")),
        )
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8080/ws".to_string());

    // short drift period so offline changes are visible
    let config = MirrorConfig::builder(endpoint)
        .drift(
            DriftConfig::builder()
                .tick_period(Duration::from_secs(5))
                .build(),
        )
        .build();

    let client = MirrorClient::connect(config).await?;
    let mut ops = client.subscribe_ops();
    let mut summary = interval(Duration::from_secs(10));

    loop {
        tokio::select! {
            event = ops.recv() => {
                match event {
                    Ok(OpsEvent::RetriesExhausted { .. }) => {
                        println!("Out of retries, trying once more in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        client.reconnect().await?;
                    }
                    Ok(event) => println!("[ops] {}", event),
                    Err(e) => eprintln!("ops feed: {}", e),
                }
            }
            _ = summary.tick() => {
                let session = client.session();
                println!("{:<14} attempt {}", session.status, session.attempt);
                for floor in client.floors().await {
                    let slots = client.slots_on_floor(floor).await;
                    let free = slots.iter().filter(|s| s.state.is_vacant()).count();
                    println!("  floor {:>2}: {:>3}/{:<3} free", floor, free, slots.len());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}
