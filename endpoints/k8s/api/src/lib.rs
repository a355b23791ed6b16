#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod traefik;

pub use self::traefik::{
    ingress_route::{self, IngressRoute, IngressRouteSpec},
    middleware::{self, Middleware, MiddlewareSpec},
    ObjectRef,
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Secret, Service, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::{OwnerReference, Time},
    ByteString,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, ResourceExt},
    error::ErrorResponse,
    Client, Error, Resource,
};
