//! Per-client limiting in front of a simulated request handler.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tollbooth::{client_identity, AdmissionConfig, LimiterRegistry, RegistryConfig, RegistrySlot};
use tracing::info;
use tracing_subscriber::EnvFilter;

// Installed once at startup, read by every handler
static REGISTRY: RegistrySlot = RegistrySlot::new();

fn handle(peer: &str, config: &AdmissionConfig) -> tollbooth::Result<u16> {
    let identity = client_identity(peer);
    let result = REGISTRY.check(&identity, config, Instant::now())?;

    if result.admitted {
        Ok(200)
    } else {
        let headers: Vec<String> = result
            .metadata()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        info!(%identity, headers = %headers.join(", "), "request rejected");
        Ok(429)
    }
}

fn main() -> tollbooth::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdmissionConfig::new(10, 10);

    // Requests before initialization are refused, not admitted
    if let Err(err) = handle("192.168.1.1:40000", &config) {
        println!("Before init: {}", err);
    }

    let registry = REGISTRY.init(LimiterRegistry::with_config(
        RegistryConfig::default()
            .with_sweep_interval(Duration::from_millis(500))
            .with_min_idle(Duration::from_millis(500)),
    )?)?;
    let sweeper = Arc::clone(&registry).start_sweeper()?;

    // Same clients, different source ports
    let peers = [
        "192.168.1.1:40001",
        "192.168.1.2:40002",
        "[2001:db8::3]:40003",
    ];

    for peer in &peers {
        for i in 1..=12 {
            let status = handle(peer, &config)?;
            if status == 200 {
                println!("{} - Request {} allowed", client_identity(peer), i);
            } else {
                println!("{} - Request {} BLOCKED", client_identity(peer), i);
            }
        }
        println!();
    }

    println!("{}", registry.stats().summary());

    // Idle clients are swept once their buckets would be full again
    thread::sleep(Duration::from_secs(3));
    println!("{}", registry.stats().summary());

    sweeper.stop();
    Ok(())
}
