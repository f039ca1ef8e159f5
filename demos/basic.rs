//! Basic usage example for the tollbooth crate.

use std::thread;
use std::time::{Duration, Instant};
use tollbooth::{AdmissionConfig, LimiterRegistry, TokenBucket};
use tracing_subscriber::EnvFilter;

fn main() -> tollbooth::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Basic Admission Example ===\n");

    // Example 1: One client's bucket
    single_bucket_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Custom configuration
    custom_config_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Monitoring metrics
    metrics_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Refill demonstration
    refill_example()?;

    Ok(())
}

fn single_bucket_example() -> tollbooth::Result<()> {
    println!("1. Single Token Bucket:");

    // 10 tokens, refilling 2 tokens per second
    let bucket = TokenBucket::new(AdmissionConfig::new(10, 2), Instant::now())?;

    println!("   Created bucket with 10 tokens, refilling 2 tokens/second");

    let mut admitted = 0;
    let mut rejected = 0;

    for i in 1..=15 {
        let result = bucket.try_consume(Instant::now());
        if result.admitted {
            admitted += 1;
            println!("   Request {} - ✅ Admitted ({} left)", i, result.remaining);
        } else {
            rejected += 1;
            println!(
                "   Request {} - ❌ Rejected (retry in {}s)",
                i,
                result.retry_after_secs()
            );
        }
    }

    println!("   Results: {} admitted, {} rejected", admitted, rejected);
    Ok(())
}

fn custom_config_example() -> tollbooth::Result<()> {
    println!("2. Custom Configuration:");

    // 100 requests per second sustained, bursts of up to 300
    let config = AdmissionConfig::per_second(100)
        .with_burst_multiplier(3)
        .with_stale_gap(Duration::from_millis(5));

    println!("   Configuration:");
    println!("   - Capacity: {}", config.capacity);
    println!("   - Refill rate: {} tokens/second", config.refill_rate);
    println!("   - Stale gap: {:?}", config.stale_gap);
    println!("   - One token every {:?}", config.token_interval());
    println!("   - Empty to full in {:?}", config.full_refill_period());

    let registry = LimiterRegistry::new();
    let now = Instant::now();
    let mut burst = 0;
    while registry.check("burst-client", &config, now)?.admitted {
        burst += 1;
    }

    println!("   Burst test: {} requests admitted at one instant", burst);
    Ok(())
}

fn metrics_example() -> tollbooth::Result<()> {
    println!("3. Monitoring and Metrics:");

    let registry = LimiterRegistry::new();
    let config = AdmissionConfig::new(20, 5);
    let now = Instant::now();

    for _ in 0..25 {
        registry.check("10.0.0.7", &config, now)?;
    }

    if let Some(bucket) = registry.get("10.0.0.7") {
        let metrics = bucket.metrics();
        println!("   Bucket Metrics:");
        println!("   - Total requests: {}", metrics.total_requests());
        println!("   - Success rate: {:.2}%", metrics.success_rate() * 100.0);
        println!(
            "   - Rejection rate: {:.2}%",
            metrics.rejection_rate() * 100.0
        );
        println!(
            "   - Available tokens: {}/{}",
            metrics.current_tokens, metrics.capacity
        );
        println!("   - {}", metrics);
    }

    println!("   Registry: {}", registry.stats());
    Ok(())
}

fn refill_example() -> tollbooth::Result<()> {
    println!("4. Token Refill Demonstration:");

    let registry = LimiterRegistry::new();
    let config = AdmissionConfig::new(5, 5);

    println!("   Configuration: 5 tokens max, refill 5 tokens/second");

    for i in 1..=5 {
        if registry.check_now("refill-client", &config)?.admitted {
            println!("   Token {} taken", i);
        }
    }

    let blocked = registry.check_now("refill-client", &config)?;
    if !blocked.admitted {
        println!("   ❌ No tokens available immediately");
        for (key, value) in blocked.metadata() {
            println!("      {}: {}", key, value);
        }
    }

    println!("   Waiting 1 second for refill...");
    thread::sleep(Duration::from_secs(1));

    let result = registry.check_now("refill-client", &config)?;
    if result.admitted {
        println!("   ✅ Admitted after refill, {} left", result.remaining);
    }

    Ok(())
}
