//! Demo: wrap a deferred view behind a flaky CDN and watch the recovery
//! ladder log its way to success (or to the fallback banner).
//!
//! ```text
//! chunkguard-demo --retries 5 --interval-ms 1000 --cdn-failures 3
//! ```

mod platform;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use chunkguard_core::{
    loader_from_fn, wrap_with_retry, CacheBustRefresher, ForceRefreshOptions, MemoryStore,
    ModuleImporter, RetryEngine, RetryOptions,
};
use platform::{DemoCaches, ExitingPage, FallbackBanner, FlakyCdn};

const HELLO_WORLD_URL: &str = "https://cdn.example.com/assets/hello-world.js";

#[derive(Debug, Parser)]
#[command(name = "chunkguard-demo", about = "Deferred-load recovery demo")]
struct Args {
    /// In-page retries before refresh logic is consulted
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Wait between attempts, in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// How many fetches the simulated CDN fails before recovering
    #[arg(long, default_value_t = 3)]
    cdn_failures: u32,

    /// Page refresh budget once retries are exhausted
    #[arg(long, default_value_t = 2)]
    refresh_retries: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let cdn = Arc::new(FlakyCdn::new(args.cdn_failures));
    let engine = Arc::new(
        RetryEngine::builder()
            .store(Arc::new(MemoryStore::new()))
            .refresher(Arc::new(CacheBustRefresher::new(
                Some(Arc::new(DemoCaches)),
                Arc::new(ExitingPage),
            )))
            .importer(cdn.clone())
            .build()?,
    );

    let loader_cdn = Arc::clone(&cdn);
    let loader = loader_from_fn(move || {
        let cdn = Arc::clone(&loader_cdn);
        async move { cdn.import(HELLO_WORLD_URL).await }
    });

    let hello_world = wrap_with_retry(
        engine,
        loader,
        RetryOptions::new()
            .retries(args.retries)
            .interval(Duration::from_millis(args.interval_ms))
            .force_refresh(
                ForceRefreshOptions::new("hello-world")
                    .cache_key_prefix("demo-app")
                    .refresh_retries(args.refresh_retries),
            )
            .fail_fallback(Arc::new(FallbackBanner))
            .on_retry(|error, retries_left| {
                tracing::warn!(%error, retries_left, "retrying deferred load");
            })
            .on_refresh(|error, refreshes_left| {
                tracing::warn!(%error, refreshes_left, "escalating to page refresh");
            })
            .on_failure(|error| {
                tracing::error!(%error, "giving up, rendering fallback");
            }),
    );

    let module = hello_world.resolve().await;
    println!("{}", module.render());

    Ok(())
}
