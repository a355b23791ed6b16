//! Traefik's `traefik.containo.us/v1alpha1` routing resources.
//!
//! Only the fields the endpoints backend reads or writes are modeled.

pub mod ingress_route;
pub mod middleware;

pub const GROUP: &str = "traefik.containo.us";

/// References a resource by name and, optionally, namespace.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct ObjectRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectRef {
    pub fn new(name: impl ToString, namespace: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }
}
