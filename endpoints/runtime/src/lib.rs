#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use kotal_endpoints_core as core;
pub use kotal_endpoints_k8s_api as k8s;
pub use kotal_endpoints_k8s_client as client;

mod api;
mod args;
mod server;

pub use self::{api::EndpointsApi, args::Args};
