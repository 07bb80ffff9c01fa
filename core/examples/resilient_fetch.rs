//! Resilient fetch example
//!
//! Walks through the retry, fallback and offline paths against a simulated
//! product API.
//!
//! Run with: RUST_LOG=debug cargo run --example resilient_fetch

use net_resilience::{
    ConnectivityMonitor, Describe, FailureDescriptor, FailureKind, ManualNetwork,
    NetworkResilience, Notice, ResilienceConfig, ResilienceOptions,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ApiError {
    ConnectionReset,
    GatewayTimeout,
    NotFound,
}

impl Describe for ApiError {
    fn describe(&self) -> FailureDescriptor {
        match self {
            ApiError::ConnectionReset => {
                FailureDescriptor::new("connection reset").with_kind(FailureKind::Transport)
            }
            ApiError::GatewayTimeout => FailureDescriptor::new("Network Error: gateway timeout")
                .with_code("ERR_NETWORK"),
            ApiError::NotFound => FailureDescriptor::new("product not found").with_code("404"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let network = Arc::new(ManualNetwork::new(true));
    let config = ResilienceConfig::from_toml_str("base_delay_ms = 100").unwrap_or_default();
    let resilience = NetworkResilience::new(ConnectivityMonitor::new(network.clone()))
        .with_config(config)
        .with_notifier(|notice: Notice| println!("   [notice] {notice}"));

    let _status = resilience.observe_connectivity(|online| {
        println!("   [connectivity] {}", if online { "online" } else { "offline" });
    });

    println!("=== net-resilience examples ===\n");

    // Example 1: transport failure, then success
    println!("1. Success after retries:");
    let mut attempt_count = 0;
    let result = resilience
        .retry(|| {
            attempt_count += 1;
            println!("   Attempt {}", attempt_count);
            let attempt = attempt_count;
            async move {
                if attempt < 3 {
                    Err(ApiError::ConnectionReset)
                } else {
                    Ok("product list")
                }
            }
        })
        .notify(|err, attempt| {
            println!("   → Retrying after {}ms due to: {:?}", attempt.delay_ms, err);
        })
        .call()
        .await;
    println!("   Result: {:?}\n", result);

    // Example 2: application error, no retry
    println!("2. Application error fails fast:");
    attempt_count = 0;
    let result: Result<&str, _> = resilience
        .retry(|| {
            attempt_count += 1;
            println!("   Attempt {}", attempt_count);
            async { Err(ApiError::NotFound) }
        })
        .call()
        .await;
    println!("   Result: {:?}\n", result);

    // Example 3: exhausted, fallback substituted
    println!("3. Retries exhausted, fallback returned:");
    let products = resilience
        .with_resilience(
            || async { Err::<Vec<&str>, _>(ApiError::GatewayTimeout) },
            resilience.options().fallback(Vec::new()),
        )
        .await;
    println!("   Result: {:?}\n", products);

    // Example 4: offline short-circuit
    println!("4. Offline, operation skipped:");
    network.go_offline();
    let products = resilience
        .with_resilience(
            || async { Ok::<_, ApiError>(vec!["never fetched"]) },
            ResilienceOptions::new(),
        )
        .await;
    println!("   Result: {:?}", products);
    network.go_online();

    println!("\n=== All examples completed ===");
}
