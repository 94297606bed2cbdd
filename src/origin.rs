//! In-process demonstration origin.
//!
//! Serves the three JSON endpoints the caching demos read from: a request
//! log, a post list and a product catalog. Each endpoint counts its calls so
//! a caller can tell a real fetch from a cached one.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::clock::Clock;
use crate::entry::Payload;
use crate::error::FetchError;
use crate::transport::Transport;

pub const LOGS_PATH: &str = "/api/logs";
pub const POSTS_PATH: &str = "/api/posts";
pub const PRODUCTS_PATH: &str = "/api/products";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u32,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub request_number: u64,
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsMeta {
    pub total_views: u64,
    pub last_fetched: String,
    pub rendering_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    pub meta: PostsMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsMeta {
    pub total_requests: u64,
    pub fetched_at: String,
    pub category: String,
    pub cache_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
    pub meta: ProductsMeta,
}

fn product(id: u32, name: &str, price: f64, category: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        price,
        category: category.to_string(),
    }
}

fn post(id: u32, title: &str, content: &str) -> Post {
    Post {
        id,
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// The fixed product catalog.
pub fn catalog() -> Vec<Product> {
    vec![
        product(1, "Next.js Handbook", 29.99, "books"),
        product(2, "React Components Kit", 49.99, "tools"),
        product(3, "TypeScript Guide", 19.99, "books"),
        product(4, "Tailwind CSS Templates", 39.99, "templates"),
    ]
}

/// The fixed post list.
pub fn posts() -> Vec<Post> {
    vec![
        post(
            1,
            "Understanding Next.js Rendering",
            "A deep dive into SSR, SSG, ISR, and CSR...",
        ),
        post(2, "React Server Components", "How to use RSC effectively..."),
        post(
            3,
            "Performance Optimization",
            "Best practices for fast web apps...",
        ),
    ]
}

/// Shared origin state. Counters start at zero and only reset with a new origin.
pub struct DemoOrigin {
    clock: Arc<dyn Clock>,
    log_requests: AtomicU64,
    post_views: AtomicU64,
    product_requests: AtomicU64,
}

impl DemoOrigin {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        DemoOrigin {
            clock,
            log_requests: AtomicU64::new(0),
            post_views: AtomicU64::new(0),
            product_requests: AtomicU64::new(0),
        }
    }

    fn timestamp(&self) -> String {
        DateTime::from_timestamp_millis(self.clock.now_ms())
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    pub fn logs(&self) -> LogsResponse {
        let request_number = self.log_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let timestamp = self.timestamp();

        tracing::info!(request_number, %timestamp, "logs API request");

        LogsResponse {
            request_number,
            timestamp,
            message: "This shows when actual network requests are made".to_string(),
        }
    }

    pub fn posts(&self) -> PostsResponse {
        let total_views = self.post_views.fetch_add(1, Ordering::SeqCst) + 1;
        let last_fetched = self.timestamp();

        tracing::info!(total_views, %last_fetched, "posts API called");

        PostsResponse {
            posts: posts(),
            meta: PostsMeta {
                total_views,
                last_fetched,
                rendering_info: "This data shows when the API was actually called".to_string(),
            },
        }
    }

    /// Products, optionally filtered by category, optionally after an artificial delay.
    pub async fn products(
        &self,
        category: Option<&str>,
        delay: Option<Duration>,
    ) -> ProductsResponse {
        let total_requests = self.product_requests.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fetched_at = self.timestamp();
        tracing::info!(
            total_requests,
            category = category.unwrap_or("all"),
            %fetched_at,
            "products API called"
        );

        let products = catalog()
            .into_iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .collect();

        ProductsResponse {
            products,
            meta: ProductsMeta {
                total_requests,
                fetched_at,
                category: category.unwrap_or("all").to_string(),
                cache_info: "This response shows actual API call timing".to_string(),
            },
        }
    }

    pub fn log_requests(&self) -> u64 {
        self.log_requests.load(Ordering::SeqCst)
    }

    pub fn post_views(&self) -> u64 {
        self.post_views.load(Ordering::SeqCst)
    }

    pub fn product_requests(&self) -> u64 {
        self.product_requests.load(Ordering::SeqCst)
    }
}

/// Routes targets such as `/api/products?category=books` to a [`DemoOrigin`].
pub struct OriginTransport {
    origin: Arc<DemoOrigin>,
    base: Url,
    offline: AtomicBool,
}

impl OriginTransport {
    pub fn new(origin: Arc<DemoOrigin>) -> Result<Self, FetchError> {
        let base = Url::parse("http://origin.local")
            .map_err(|e| FetchError::Config(format!("invalid origin base url: {}", e)))?;
        Ok(OriginTransport {
            origin,
            base,
            offline: AtomicBool::new(false),
        })
    }

    pub fn origin(&self) -> &Arc<DemoOrigin> {
        &self.origin
    }

    /// While offline every fetch fails as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for OriginTransport {
    fn name(&self) -> &'static str {
        "origin"
    }

    async fn fetch(&self, target: &str) -> Result<Payload, FetchError> {
        if self.is_offline() {
            return Err(FetchError::transport(target, "origin unreachable"));
        }

        let url = self
            .base
            .join(target)
            .map_err(|e| FetchError::transport(target, format!("invalid target: {}", e)))?;

        match url.path() {
            LOGS_PATH => Payload::from_json(&self.origin.logs()),
            POSTS_PATH => Payload::from_json(&self.origin.posts()),
            PRODUCTS_PATH => {
                let mut category = None;
                let mut delay = None;
                for (name, value) in url.query_pairs() {
                    match name.as_ref() {
                        "category" => category = Some(value.into_owned()),
                        // Unparseable delays are ignored
                        "delay" => delay = value.parse::<u64>().ok().map(Duration::from_millis),
                        _ => {}
                    }
                }
                Payload::from_json(&self.origin.products(category.as_deref(), delay).await)
            }
            other => Err(FetchError::transport(
                target,
                format!("HTTP 404 Not Found: {}", other),
            )),
        }
    }
}
