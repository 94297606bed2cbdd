//! Fetch cache bound to a transport.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::cache::FetchCache;
use crate::entry::Payload;
use crate::error::FetchError;
use crate::pass::RenderPass;
use crate::strategy::FetchRequest;
use crate::transport::Transport;

/// Pairs a [`FetchCache`] with the [`Transport`] that performs real fetches.
///
/// # Example
///
/// ```ignore
/// let client = FetchClient::new(cache, Arc::new(transport));
/// let pass = client.begin_pass();
///
/// let products: ProductsResponse = client
///     .fetch_json(&pass, &FetchRequest::tagged("/api/products", ["products"], Duration::from_secs(3600)))
///     .await?;
///
/// client.invalidate_tag("products");
/// ```
#[derive(Clone)]
pub struct FetchClient {
    cache: FetchCache,
    transport: Arc<dyn Transport>,
}

impl FetchClient {
    pub fn new(cache: FetchCache, transport: Arc<dyn Transport>) -> Self {
        FetchClient { cache, transport }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn begin_pass(&self) -> RenderPass {
        self.cache.begin_pass()
    }

    /// Resolve `request` within `pass`, fetching through the transport when needed.
    pub async fn fetch(
        &self,
        pass: &RenderPass,
        request: &FetchRequest,
    ) -> Result<Payload, FetchError> {
        let transport = self.transport.clone();
        let target = request.target.clone();

        tracing::trace!(
            pass = pass.id(),
            transport = transport.name(),
            target_url = %target,
            "fetch"
        );

        pass.fetch(&self.cache, request, move || async move {
            transport.fetch(&target).await
        })
        .await
    }

    /// [`fetch`](Self::fetch), then decode the payload.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        pass: &RenderPass,
        request: &FetchRequest,
    ) -> Result<T, FetchError> {
        self.fetch(pass, request).await?.json()
    }

    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.cache.invalidate_tag(tag)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }
}
