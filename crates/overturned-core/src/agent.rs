use anyhow::Result;
use async_trait::async_trait;

use crate::types::{GenerateRequest, ModelReply};

/// A remote model that answers one single-turn generation request.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply>;

    /// Short provider name used in logs.
    fn name(&self) -> &str;
}
