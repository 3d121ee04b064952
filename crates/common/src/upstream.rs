//! Upstream weather source.

use async_trait::async_trait;

use crate::{CoordinateKey, Result};

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// One request for the current temperature at `key`. No retries;
    /// any transport, status, or payload problem is `Error::Upstream`.
    async fn fetch(&self, key: CoordinateKey) -> Result<f64>;
}
