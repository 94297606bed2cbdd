use fetch_cache::{FetchError, Payload};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Catalog item served by the fake origin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchProduct {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub category: String,
}

impl BenchProduct {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("Product {}", id),
            price: (id % 100) as f64 + 0.99,
            category: ["books", "tools", "templates"][(id % 3) as usize].to_string(),
        }
    }
}

/// Simulated origin with configurable latency
#[derive(Clone)]
pub struct FakeOrigin {
    latency_ms: u64,
    request_count: Arc<AtomicUsize>,
}

impl FakeOrigin {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fetch `target`, answering with a small product list.
    pub async fn fetch(&self, target: &str) -> Result<Payload, FetchError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        // Simulate network latency
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        let products: Vec<BenchProduct> = (0..8).map(BenchProduct::new).collect();
        Payload::from_json(&serde_json::json!({ "target": target, "products": products }))
    }

    #[allow(dead_code)]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    #[allow(dead_code)]
    pub fn reset_count(&self) {
        self.request_count.store(0, Ordering::Relaxed);
    }
}

/// Generate fetch targets for different workload patterns
pub struct TargetGenerator {
    num_targets: usize,
}

impl TargetGenerator {
    pub fn new(num_targets: usize) -> Self {
        Self { num_targets }
    }

    /// Generate sequential targets (for cold cache tests)
    pub fn sequential(&self) -> Vec<String> {
        (0..self.num_targets)
            .map(|i| format!("/api/products?page={}", i))
            .collect()
    }

    /// Generate targets for a mixed workload (some hits, some misses)
    pub fn mixed(&self, hit_ratio: f64) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let hot_count = ((self.num_targets as f64 * hit_ratio) as usize).max(1);

        (0..1000)
            .map(|_| {
                let page = if rng.gen_bool(hit_ratio) || hot_count >= self.num_targets {
                    rng.gen_range(0..hot_count)
                } else {
                    rng.gen_range(hot_count..self.num_targets)
                };
                format!("/api/products?page={}", page)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_origin() {
        use super::FakeOrigin;

        let origin = FakeOrigin::new(1);

        let payload = origin.fetch("/api/products?page=0").await.unwrap();
        assert_eq!(payload.value()["products"].as_array().unwrap().len(), 8);

        assert_eq!(origin.request_count(), 1);
    }

    #[test]
    fn test_target_generator() {
        use super::TargetGenerator;

        let targets = TargetGenerator::new(100);

        let seq = targets.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], "/api/products?page=0");

        let mixed = targets.mixed(0.8);
        assert_eq!(mixed.len(), 1000);
    }
}
