use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("schema store rejected the load: {0}")]
pub struct LoadError(pub String);

/// Hand-off seam for the downstream schema data store. The store itself is
/// external; the workflow only needs to deliver the serialized RFC and learn
/// whether delivery succeeded.
#[async_trait]
pub trait SchemaLoader: Send + Sync {
    async fn load(&self, rfc_json: &[u8]) -> Result<(), LoadError>;
}

/// Accepts every load and logs it. Stands in until a concrete schema store
/// client is wired up.
#[derive(Debug, Default)]
pub struct LogOnlyLoader;

#[async_trait]
impl SchemaLoader for LogOnlyLoader {
    async fn load(&self, rfc_json: &[u8]) -> Result<(), LoadError> {
        info!(bytes = rfc_json.len(), "handing RFC content to schema store");
        Ok(())
    }
}
