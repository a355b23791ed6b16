use crate::{
    endpoint::{Credentials, ExposedPort},
    k8s::{ingress_route::Route, labels, IngressRoute, ResourceExt, Time},
};
use serde::Serialize;

/// What callers see of an endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Time>,
    pub routes: Vec<RouteView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<Credentials>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteView {
    /// The exposed port's name.
    pub name: String,
    /// The public URL of the port.
    pub route: String,
}

impl EndpointView {
    pub fn new(route: &IngressRoute, basic_auth: Option<Credentials>) -> Self {
        let label = |key: &str| route.labels().get(key).cloned();
        let host = route.spec.routes.first().and_then(Route::host).unwrap_or("");
        let routes = ExposedPort::from_route(route)
            .into_iter()
            .map(|port| RouteView {
                route: format!("https://{host}/{}", port.public_id),
                name: port.port_name,
            })
            .collect();

        Self {
            name: route.name_any(),
            protocol: label(labels::PROTOCOL),
            network: label(labels::NETWORK),
            kind: label(labels::KIND),
            created_at: route.metadata.creation_timestamp.clone(),
            routes,
            basic_auth,
        }
    }
}
