//! Middlewares shared by every endpoint in the cluster.
//!
//! Shared middlewares are created lazily, the first time an endpoint references them, and are
//! never owned by (or deleted with) an endpoint. Their plugin configuration is captured when
//! they're created and is not refreshed afterwards.
//!
//! There is no locking around creation: concurrent first-time provisioning may race between
//! the existence check and the create. Unless conflicts are ignored, the losing caller fails
//! with a conflict.

use crate::{
    k8s::{
        middleware::{MiddlewareKind, MiddlewareSpec},
        Middleware, ObjectMeta, ObjectRef,
    },
    Deadline, ResourceClient, Result,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const ACTIVITY: &str = "crossover-activity";
pub const CACHE: &str = "crossover-cache";
pub const DEFAULT_NAMESPACE: &str = "kotal";

/// Configures the traffic activity plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfig {
    pub api_key: String,
    pub pattern: String,
    pub remote_address: String,
    pub buffer_size: u32,
    pub batch_size: u32,
    pub flush_interval: String,
}

/// Configures the response cache plugin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    pub redis_address: String,
    pub redis_auth: String,
    pub redis_pool_size: u32,
    /// Seconds a cached response remains valid.
    pub cache_expiry: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedMiddlewares {
    pub namespace: String,
    pub activity: ActivityConfig,
    pub cache: CacheConfig,
    /// Treats a conflict while creating a shared middleware as success.
    pub ignore_conflicts: bool,
}

// === impl SharedMiddlewares ===

impl SharedMiddlewares {
    /// References to the shared middlewares, in the order they apply to requests.
    pub fn refs(&self) -> [ObjectRef; 2] {
        [
            ObjectRef::new(ACTIVITY, &self.namespace),
            ObjectRef::new(CACHE, &self.namespace),
        ]
    }

    pub async fn ensure_activity(
        &self,
        client: &dyn ResourceClient<Middleware>,
        deadline: Deadline,
    ) -> Result<()> {
        ensure_exists(
            client,
            ACTIVITY,
            &self.namespace,
            || plugin(ACTIVITY, &self.namespace, &self.activity),
            self.ignore_conflicts,
            deadline,
        )
        .await
    }

    pub async fn ensure_cache(
        &self,
        client: &dyn ResourceClient<Middleware>,
        deadline: Deadline,
    ) -> Result<()> {
        ensure_exists(
            client,
            CACHE,
            &self.namespace,
            || plugin(CACHE, &self.namespace, &self.cache),
            self.ignore_conflicts,
            deadline,
        )
        .await
    }
}

impl Default for SharedMiddlewares {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            activity: ActivityConfig::default(),
            cache: CacheConfig::default(),
            ignore_conflicts: false,
        }
    }
}

/// Creates the named middleware unless it already exists.
///
/// Existence is all that is checked: an existing middleware is never compared against `build`
/// nor updated.
pub async fn ensure_exists<F>(
    client: &dyn ResourceClient<Middleware>,
    name: &str,
    namespace: &str,
    build: F,
    ignore_conflicts: bool,
    deadline: Deadline,
) -> Result<()>
where
    F: FnOnce() -> Result<Middleware>,
{
    match client.get(namespace, name, deadline).await {
        Ok(_) => {
            debug!(%namespace, %name, "Shared middleware exists");
            return Ok(());
        }
        Err(error) if error.is_not_found() => {}
        Err(error) => return Err(error),
    }

    let middleware = build()?;
    match client.create(&middleware, deadline).await {
        Ok(_) => {
            info!(%namespace, %name, "Created shared middleware");
            Ok(())
        }
        Err(error) if ignore_conflicts && error.is_conflict() => {
            info!(%namespace, %name, "Shared middleware was created concurrently");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

/// Builds a plugin middleware named after the plugin it configures.
fn plugin<C: Serialize>(name: &str, namespace: &str, config: &C) -> Result<Middleware> {
    let config = serde_json::to_value(config)?;
    Ok(Middleware {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: MiddlewareSpec::from(MiddlewareKind::Plugin(BTreeMap::from([(
            name.to_string(),
            config,
        )]))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn activity_payload() {
        let config = ActivityConfig {
            api_key: "key".to_string(),
            pattern: "^/([a-z0-9]+)".to_string(),
            remote_address: "http://collector:8080".to_string(),
            buffer_size: 1000,
            batch_size: 100,
            flush_interval: "5s".to_string(),
        };
        let mw = plugin(ACTIVITY, "kotal", &config).unwrap();
        assert_eq!(mw.metadata.name.as_deref(), Some(ACTIVITY));
        assert_eq!(mw.metadata.namespace.as_deref(), Some("kotal"));
        assert_eq!(
            serde_json::to_value(&mw.spec).unwrap(),
            serde_json::json!({
                "plugin": {
                    "crossover-activity": {
                        "apiKey": "key",
                        "pattern": "^/([a-z0-9]+)",
                        "remoteAddress": "http://collector:8080",
                        "bufferSize": 1000,
                        "batchSize": 100,
                        "flushInterval": "5s",
                    }
                }
            })
        );
    }

    #[test]
    fn refs_are_ordered() {
        let shared = SharedMiddlewares::default();
        assert_eq!(
            shared.refs(),
            [
                ObjectRef::new("crossover-activity", "kotal"),
                ObjectRef::new("crossover-cache", "kotal"),
            ]
        );
    }
}
