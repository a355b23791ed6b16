//! Builds the resources that make up an endpoint.
//!
//! The route is the root of every endpoint: all other per-endpoint resources carry an owner
//! reference to it so that deleting the route garbage-collects them.

use crate::{
    endpoint::{Credentials, EndpointRequest, ExposedPort},
    k8s::{
        ingress_route::{BackendService, Port, Route, RouteKind, Tls},
        labels::Map,
        middleware::{BasicAuth, MiddlewareKind, StripPrefix},
        IngressRoute, IngressRouteSpec, Middleware, MiddlewareSpec, ObjectMeta, ObjectRef,
        OwnerReference, Resource, ResourceExt, Secret, Service,
    },
    Error, Result,
};
use std::collections::BTreeMap;

pub const BASIC_AUTH_SECRET_TYPE: &str = "kubernetes.io/basic-auth";

/// Everything needed to build an endpoint's route.
#[derive(Debug)]
pub struct RouteParams<'a> {
    pub request: &'a EndpointRequest,
    pub service: &'a Service,
    pub ports: &'a [ExposedPort],
    pub labels: Map,
    pub host: &'a str,
    pub entry_points: &'a [String],
    pub tls_secret_name: Option<&'a str>,
    pub shared: &'a [ObjectRef],
}

pub fn strip_prefix_name(endpoint: &str) -> String {
    format!("strip-prefix-{endpoint}")
}

pub fn basic_auth_name(endpoint: &str) -> String {
    format!("basic-auth-{endpoint}")
}

pub fn secret_name(endpoint: &str) -> String {
    format!("{endpoint}-secret")
}

/// Returns the host under which all endpoints of a domain are served.
pub fn endpoints_host(domain: &str) -> String {
    format!("endpoints.{domain}")
}

/// Builds the route: one rule per exposed port, each running the shared middlewares, then the
/// endpoint's prefix stripping, then (optionally) its basic auth.
///
/// The route inherits the backend Service's owner references so that it's deleted along with
/// the node that owns the Service.
pub fn ingress_route(params: RouteParams<'_>) -> IngressRoute {
    let RouteParams {
        request,
        service,
        ports,
        labels,
        host,
        entry_points,
        tls_secret_name,
        shared,
    } = params;

    let mut middlewares = shared.to_vec();
    middlewares.push(ObjectRef::new(
        strip_prefix_name(&request.name),
        &request.namespace,
    ));
    if request.use_basic_auth {
        middlewares.push(ObjectRef::new(
            basic_auth_name(&request.name),
            &request.namespace,
        ));
    }

    let routes = ports
        .iter()
        .map(|port| Route {
            rule: Route::host_path_rule(host, &port.public_id),
            kind: RouteKind::Rule,
            middlewares: middlewares.clone(),
            services: vec![BackendService {
                name: service.name_any(),
                namespace: Some(request.namespace.clone()),
                port: Port::Name(port.port_name.clone()),
            }],
        })
        .collect();

    IngressRoute {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(labels),
            owner_references: service.metadata.owner_references.clone(),
            ..Default::default()
        },
        spec: IngressRouteSpec {
            entry_points: entry_points.to_vec(),
            routes,
            tls: tls_secret_name.map(|name| Tls {
                secret_name: Some(name.to_string()),
            }),
        },
    }
}

/// Returns an owner reference to a route that has been created.
pub fn owner_reference(route: &IngressRoute) -> Result<OwnerReference> {
    route.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal(format_args!(
            "IngressRoute {} has no uid",
            route.name_any()
        ))
    })
}

/// Strips each public path prefix so the backend sees clean paths.
pub fn strip_prefix(route: &IngressRoute, owner: &OwnerReference) -> Middleware {
    let prefixes = route
        .spec
        .routes
        .iter()
        .filter_map(Route::path_prefix)
        .map(|prefix| format!("/{prefix}"))
        .collect();
    owned_middleware(
        route,
        strip_prefix_name(&route.name_any()),
        owner,
        MiddlewareKind::StripPrefix(StripPrefix { prefixes }),
    )
}

pub fn basic_auth_secret(
    route: &IngressRoute,
    owner: &OwnerReference,
    credentials: &Credentials,
) -> Secret {
    Secret {
        metadata: owned_metadata(route, secret_name(&route.name_any()), owner),
        type_: Some(BASIC_AUTH_SECRET_TYPE.to_string()),
        string_data: Some(BTreeMap::from([
            ("username".to_string(), credentials.username.clone()),
            ("password".to_string(), credentials.password.clone()),
        ])),
        immutable: Some(true),
        ..Default::default()
    }
}

pub fn basic_auth_middleware(route: &IngressRoute, owner: &OwnerReference) -> Middleware {
    let name = route.name_any();
    owned_middleware(
        route,
        basic_auth_name(&name),
        owner,
        MiddlewareKind::BasicAuth(BasicAuth {
            secret: secret_name(&name),
        }),
    )
}

fn owned_middleware(
    route: &IngressRoute,
    name: String,
    owner: &OwnerReference,
    kind: MiddlewareKind,
) -> Middleware {
    Middleware {
        metadata: owned_metadata(route, name, owner),
        spec: MiddlewareSpec::from(kind),
    }
}

fn owned_metadata(route: &IngressRoute, name: String, owner: &OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: route.namespace(),
        labels: route.metadata.labels.clone(),
        owner_references: Some(vec![owner.clone()]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::ServiceSpec;
    use maplit::{btreemap, convert_args};
    use pretty_assertions::assert_eq;

    fn mk_request(use_basic_auth: bool) -> EndpointRequest {
        EndpointRequest {
            name: "node-0".to_string(),
            namespace: "ns-0".to_string(),
            user_id: "u-1".to_string(),
            labels: Map::new(),
            use_basic_auth,
        }
    }

    fn mk_service() -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("node-0".to_string()),
                namespace: Some("ns-0".to_string()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "ethereum.kotal.io/v1alpha1".to_string(),
                    kind: "Node".to_string(),
                    name: "node-0".to_string(),
                    uid: "node-uid".to_string(),
                    controller: Some(true),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        }
    }

    fn mk_route(use_basic_auth: bool) -> IngressRoute {
        let request = mk_request(use_basic_auth);
        let service = mk_service();
        let ports = [
            ExposedPort {
                public_id: "aaa".to_string(),
                port_name: "api".to_string(),
            },
            ExposedPort {
                public_id: "bbb".to_string(),
                port_name: "rpc".to_string(),
            },
        ];
        let shared = [
            ObjectRef::new("crossover-activity", "kotal"),
            ObjectRef::new("crossover-cache", "kotal"),
        ];
        let mut route = ingress_route(RouteParams {
            request: &request,
            service: &service,
            ports: &ports,
            labels: convert_args!(btreemap!("kotal.io/user-id" => "u-1")),
            host: "endpoints.example.com",
            entry_points: &["websecure".to_string()],
            tls_secret_name: None,
            shared: &shared,
        });
        route.metadata.uid = Some("route-uid".to_string());
        route
    }

    #[test]
    fn route_per_port() {
        let route = mk_route(true);
        assert_eq!(
            route.metadata.owner_references.as_ref().unwrap()[0].uid,
            "node-uid"
        );
        assert_eq!(route.spec.routes.len(), 2);
        let rule = &route.spec.routes[1];
        assert_eq!(
            rule.rule,
            "Host(`endpoints.example.com`) && PathPrefix(`/bbb`)"
        );
        assert_eq!(
            rule.middlewares
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>(),
            vec![
                "crossover-activity",
                "crossover-cache",
                "strip-prefix-node-0",
                "basic-auth-node-0"
            ]
        );
        assert_eq!(
            rule.services,
            vec![BackendService {
                name: "node-0".to_string(),
                namespace: Some("ns-0".to_string()),
                port: Port::Name("rpc".to_string()),
            }]
        );
    }

    #[test]
    fn owned_children() {
        let route = mk_route(true);
        let owner = owner_reference(&route).unwrap();
        assert_eq!(owner.uid, "route-uid");
        assert_eq!(owner.kind, "IngressRoute");

        let mw = strip_prefix(&route, &owner);
        assert_eq!(mw.metadata.name.as_deref(), Some("strip-prefix-node-0"));
        assert_eq!(mw.metadata.owner_references, Some(vec![owner.clone()]));
        assert_eq!(
            mw.spec.kind,
            MiddlewareKind::StripPrefix(StripPrefix {
                prefixes: vec!["/aaa".to_string(), "/bbb".to_string()]
            })
        );

        let credentials = Credentials {
            username: "user1234".to_string(),
            password: "pass1234".to_string(),
        };
        let secret = basic_auth_secret(&route, &owner, &credentials);
        assert_eq!(secret.metadata.name.as_deref(), Some("node-0-secret"));
        assert_eq!(secret.type_.as_deref(), Some(BASIC_AUTH_SECRET_TYPE));
        assert_eq!(secret.immutable, Some(true));
        assert_eq!(secret.string_data.unwrap()["username"], "user1234");

        let mw = basic_auth_middleware(&route, &owner);
        assert_eq!(mw.metadata.name.as_deref(), Some("basic-auth-node-0"));
        assert_eq!(
            mw.spec.kind,
            MiddlewareKind::BasicAuth(BasicAuth {
                secret: "node-0-secret".to_string()
            })
        );
    }

    #[test]
    fn uncreated_route_has_no_owner_reference() {
        let mut route = mk_route(false);
        route.metadata.uid = None;
        assert!(owner_reference(&route).is_err());
        assert!(route.spec.routes[0]
            .middlewares
            .iter()
            .all(|m| !m.name.starts_with("basic-auth")));
    }
}
