use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request-processing step referenced by routes.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "traefik.containo.us",
    version = "v1alpha1",
    kind = "Middleware",
    namespaced
)]
pub struct MiddlewareSpec {
    #[serde(flatten)]
    pub kind: MiddlewareKind,
}

/// Only one kind of middleware may be configured on a resource.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MiddlewareKind {
    StripPrefix(StripPrefix),
    BasicAuth(BasicAuth),
    /// Plugin configurations keyed by the plugin's registered name.
    Plugin(BTreeMap<String, serde_json::Value>),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct StripPrefix {
    pub prefixes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct BasicAuth {
    /// Name of a `kubernetes.io/basic-auth` Secret in the middleware's namespace.
    pub secret: String,
}

impl From<MiddlewareKind> for MiddlewareSpec {
    fn from(kind: MiddlewareKind) -> Self {
        Self { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strip_prefix_json() {
        let spec = MiddlewareSpec::from(MiddlewareKind::StripPrefix(StripPrefix {
            prefixes: vec!["/a".to_string(), "/b".to_string()],
        }));
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            serde_json::json!({ "stripPrefix": { "prefixes": ["/a", "/b"] } })
        );
    }

    #[test]
    fn plugin_from_json() {
        let spec: MiddlewareSpec = serde_json::from_value(serde_json::json!({
            "plugin": { "crossover-cache": { "redisAddress": "redis:6379" } }
        }))
        .unwrap();
        let MiddlewareKind::Plugin(plugins) = spec.kind else {
            panic!("expected a plugin middleware");
        };
        assert_eq!(
            plugins["crossover-cache"],
            serde_json::json!({ "redisAddress": "redis:6379" })
        );
    }

    #[test]
    fn basic_auth_json() {
        let spec: MiddlewareSpec = serde_json::from_value(serde_json::json!({
            "basicAuth": { "secret": "node-secret" }
        }))
        .unwrap();
        assert_eq!(
            spec.kind,
            MiddlewareKind::BasicAuth(BasicAuth {
                secret: "node-secret".to_string()
            })
        );
    }
}
