use crate::{Result, Selector};

/// The instant by which a resource-client call must complete.
pub type Deadline = tokio::time::Instant;

/// Create/get/list/update/delete access to one namespaced resource kind.
///
/// Implementations normalize their failures into [`crate::Error`] and must give up once the
/// deadline passes.
#[async_trait::async_trait]
pub trait ResourceClient<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    async fn create(&self, resource: &K, deadline: Deadline) -> Result<K>;

    async fn get(&self, namespace: &str, name: &str, deadline: Deadline) -> Result<K>;

    async fn list(&self, namespace: &str, selector: &Selector, deadline: Deadline)
        -> Result<Vec<K>>;

    async fn update(&self, resource: &K, deadline: Deadline) -> Result<K>;

    async fn delete(&self, namespace: &str, name: &str, deadline: Deadline) -> Result<()>;
}

/// Resolves the base domain under which endpoints are served.
#[async_trait::async_trait]
pub trait DomainLookup: Send + Sync {
    async fn base_url(&self) -> Result<String>;
}

/// A domain fixed at startup.
#[derive(Clone, Debug)]
pub struct StaticDomain(String);

impl StaticDomain {
    pub fn new(domain: impl ToString) -> Self {
        Self(domain.to_string())
    }
}

#[async_trait::async_trait]
impl DomainLookup for StaticDomain {
    async fn base_url(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(crate::Error::internal("domain base url is not configured"));
        }
        Ok(self.0.clone())
    }
}
