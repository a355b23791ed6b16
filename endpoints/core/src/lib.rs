#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod allocator;
mod client;
pub mod endpoint;
mod error;
pub mod labels;
pub mod ports;
pub mod resources;
mod selector;
pub mod shared;
pub mod view;


pub use self::{
    allocator::PublicIdAllocator,
    client::{Deadline, DomainLookup, ResourceClient, StaticDomain},
    endpoint::{Config, Created, Credentials, EndpointRequest, Endpoints, ExposedPort},
    error::{Error, Result, Status},
    ports::PortFilter,
    selector::{ListFilter, Selector},
    shared::SharedMiddlewares,
    view::EndpointView,
};
pub use kotal_endpoints_k8s_api as k8s;
