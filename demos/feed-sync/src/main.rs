//! Feed sync example binary
//!
//! Opens a simulated paginated feed and lets the fixpoint loop request
//! every page.

use feed_sync::{FeedAction, FeedEnvironment, FeedState, SimulatedSource, feed_reducer, host};
use fetchloop_core::config::FetchConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_sync=debug,fetchloop_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = FetchConfig::from_env()?;
    tracing::info!(?config, "Loaded fetch configuration");

    println!("=== Feed Sync Example: derived-action fixpoint loop ===\n");

    let env = FeedEnvironment::new(SimulatedSource::new(4, 3).fail_once(3));
    let reducer = feed_reducer().with_config(config);
    let mut state = FeedState::default();

    println!(">>> Sending: Open");
    let processed = host::run_until_idle(&reducer, &mut state, &env, FeedAction::Open).await;
    println!("Processed {processed} actions");
    println!("Loaded pages: {:?}", state.pages.keys().collect::<Vec<_>>());
    println!("Failures: {:?}", state.failures);

    println!("\n>>> Sending: Retry");
    let processed = host::run_until_idle(&reducer, &mut state, &env, FeedAction::Retry).await;
    println!("Processed {processed} actions");
    println!("Loaded pages: {:?}", state.pages.keys().collect::<Vec<_>>());
    println!("Complete: {}", state.is_complete());

    println!("\nItems:");
    for item in state.items() {
        println!("  • {item}");
    }

    Ok(())
}
