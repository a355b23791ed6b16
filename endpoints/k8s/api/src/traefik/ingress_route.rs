use super::ObjectRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binds host/path matches to backend services through ordered middleware chains.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "traefik.containo.us",
    version = "v1alpha1",
    kind = "IngressRoute",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IngressRouteSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Tls>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Route {
    #[serde(rename = "match")]
    pub rule: String,
    pub kind: RouteKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middlewares: Vec<ObjectRef>,
    #[serde(default)]
    pub services: Vec<BackendService>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum RouteKind {
    #[default]
    Rule,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct BackendService {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub port: Port,
}

/// References a Service port by name or number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Port {
    Number(u16),
    Name(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

// === impl Route ===

impl Route {
    /// Builds a rule matching `host` and requests under `/prefix`.
    pub fn host_path_rule(host: &str, prefix: &str) -> String {
        format!("Host(`{host}`) && PathPrefix(`/{prefix}`)")
    }

    /// Returns the path prefix (without its leading slash) this route matches, if any.
    pub fn path_prefix(&self) -> Option<&str> {
        let (_, rest) = self.rule.split_once("PathPrefix(`/")?;
        let (prefix, _) = rest.split_once("`)")?;
        Some(prefix)
    }

    /// Returns the host this route matches, if any.
    pub fn host(&self) -> Option<&str> {
        let (_, rest) = self.rule.split_once("Host(`")?;
        let (host, _) = rest.split_once("`)")?;
        Some(host)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Number(n) => fmt::Display::fmt(n, f),
            Port::Name(n) => fmt::Display::fmt(n, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rule_parts() {
        let route = Route {
            rule: Route::host_path_rule("endpoints.kotal.cloud", "abc123user"),
            kind: RouteKind::Rule,
            middlewares: vec![],
            services: vec![],
        };
        assert_eq!(
            route.rule,
            "Host(`endpoints.kotal.cloud`) && PathPrefix(`/abc123user`)"
        );
        assert_eq!(route.host(), Some("endpoints.kotal.cloud"));
        assert_eq!(route.path_prefix(), Some("abc123user"));
    }

    #[test]
    fn rule_without_prefix() {
        let route = Route {
            rule: "Host(`example.com`)".to_string(),
            kind: RouteKind::Rule,
            middlewares: vec![],
            services: vec![],
        };
        assert_eq!(route.path_prefix(), None);
        assert_eq!(route.host(), Some("example.com"));
    }

    #[test]
    fn spec_json() {
        let spec = IngressRouteSpec {
            entry_points: vec!["websecure".to_string()],
            routes: vec![Route {
                rule: Route::host_path_rule("endpoints.example.com", "x1"),
                kind: RouteKind::Rule,
                middlewares: vec![ObjectRef::new("crossover-activity", "kotal")],
                services: vec![BackendService {
                    name: "node".to_string(),
                    namespace: Some("ns-0".to_string()),
                    port: Port::Name("rpc".to_string()),
                }],
            }],
            tls: None,
        };
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            serde_json::json!({
                "entryPoints": ["websecure"],
                "routes": [{
                    "match": "Host(`endpoints.example.com`) && PathPrefix(`/x1`)",
                    "kind": "Rule",
                    "middlewares": [{"name": "crossover-activity", "namespace": "kotal"}],
                    "services": [{"name": "node", "namespace": "ns-0", "port": "rpc"}],
                }],
            })
        );
    }
}
