//! Walk through the caching strategies against the in-process demo origin.
//!
//! Run with `RUST_LOG=fetch_cache=debug cargo run --example strategies` to see
//! every cache decision. Time is driven by a manual clock so revalidation
//! windows elapse instantly.

use fetch_cache::origin::{LOGS_PATH, LogsResponse, POSTS_PATH, PostsResponse, ProductsResponse};
use fetch_cache::{
    Clock, DemoOrigin, FetchCacheBuilder, FetchClient, FetchRequest, ManualClock, MetricsStore,
    MokaStore, MokaStoreConfig, OriginTransport, StatsSink, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let clock = Arc::new(ManualClock::new(SystemClock.now_ms()));
    let origin = Arc::new(DemoOrigin::new(clock.clone()));
    let transport = Arc::new(OriginTransport::new(origin.clone())?);
    let stats = Arc::new(StatsSink::default());
    let metrics = Arc::new(MetricsStore::new(
        Arc::new(MokaStore::new(MokaStoreConfig::default())),
        stats.clone(),
    ));
    let client = FetchClient::new(
        FetchCacheBuilder::from_env()
            .store(metrics.clone())
            .clock(clock.clone())
            .build(),
        transport.clone(),
    );

    // Fetch cache: forever vs no-store
    println!("== fetch cache ==");
    for render in 1..=3 {
        let pass = client.begin_pass();
        let cached: PostsResponse = client
            .fetch_json(&pass, &FetchRequest::forever(POSTS_PATH))
            .await?;
        let live: LogsResponse = client
            .fetch_json(&pass, &FetchRequest::no_store(LOGS_PATH))
            .await?;
        println!(
            "render {}: posts totalViews={} (cached), logs requestNumber={} (no-store)",
            render, cached.meta.total_views, live.request_number
        );
    }

    // Request memoization: one pass, many components asking for the same data
    println!("\n== request memoization ==");
    let pass = client.begin_pass();
    let request = FetchRequest::no_store(LOGS_PATH);
    let (header, sidebar, footer) = tokio::join!(
        client.fetch_json::<LogsResponse>(&pass, &request),
        client.fetch_json::<LogsResponse>(&pass, &request),
        client.fetch_json::<LogsResponse>(&pass, &request),
    );
    println!(
        "header={} sidebar={} footer={} (origin saw {} log requests in total)",
        header?.request_number,
        sidebar?.request_number,
        footer?.request_number,
        origin.log_requests()
    );
    drop(pass);

    // Time-based revalidation
    println!("\n== time-based revalidation ==");
    let products =
        FetchRequest::revalidate("/api/products?category=books", Duration::from_secs(15));
    for step in [0, 10, 10] {
        clock.advance(Duration::from_secs(step));
        let response: ProductsResponse = client.fetch_json(&client.begin_pass(), &products).await?;
        println!(
            "+{}s: totalRequests={} fetchedAt={}",
            step, response.meta.total_requests, response.meta.fetched_at
        );
    }

    // Cache tags and on-demand invalidation
    println!("\n== cache tags ==");
    let hour = Duration::from_secs(3600);
    let all = FetchRequest::tagged("/api/products", ["products", "products-all"], hour);
    let books = FetchRequest::tagged(
        "/api/products?category=books",
        ["products", "products-books"],
        hour,
    );
    let tools = FetchRequest::tagged(
        "/api/products?category=tools",
        ["products", "products-tools"],
        hour,
    );

    let show = |label: &str, response: &ProductsResponse| {
        println!(
            "{:>6}: {} products, totalRequests={}",
            label,
            response.products.len(),
            response.meta.total_requests
        );
    };

    for tag in [None, Some("products-books"), Some("products")] {
        if let Some(tag) = tag {
            let affected = client.invalidate_tag(tag);
            println!("-- invalidated '{}' ({} entries)", tag, affected);
        }
        let pass = client.begin_pass();
        show("all", &client.fetch_json(&pass, &all).await?);
        show("books", &client.fetch_json(&pass, &books).await?);
        show("tools", &client.fetch_json(&pass, &tools).await?);
    }

    // Serve stale on error
    println!("\n== serve stale on error ==");
    client.invalidate_all();
    transport.set_offline(true);
    let stale: ProductsResponse = client.fetch_json(&client.begin_pass(), &all).await?;
    println!(
        "origin offline, served stale entry from request {}",
        stale.meta.total_requests
    );

    let missing = client
        .fetch(&client.begin_pass(), &FetchRequest::forever("/api/products?category=templates"))
        .await;
    if let Err(err) = missing {
        println!("nothing cached for templates: {}", err);
    }
    transport.set_offline(false);

    let snapshot = stats.snapshot();
    println!(
        "\nstore: {} hits, {} misses, {} writes (hit rate {:.2})",
        snapshot.hits,
        snapshot.misses,
        snapshot.writes,
        snapshot.hit_rate()
    );
    metrics.sink().flush().await?;

    Ok(())
}
