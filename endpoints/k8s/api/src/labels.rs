//! Label keys shared between backend node Services and the endpoints exposing them.

use std::collections::BTreeMap;

pub type Map = BTreeMap<String, String>;

/// Set on every route this backend creates, with [`CREATED_BY_VALUE`].
pub const CREATED_BY: &str = "app.kubernetes.io/created-by";
pub const CREATED_BY_VALUE: &str = "kotal-api";

/// Component of the backend node, e.g. `ethereum-node-api`.
pub const COMPONENT: &str = "app.kubernetes.io/component";

pub const PROTOCOL: &str = "kotal.io/protocol";
pub const NETWORK: &str = "kotal.io/network";

/// The tenant owning an endpoint.
pub const USER_ID: &str = "kotal.io/user-id";

/// Derived from the last segment of the backend's [`COMPONENT`] label.
pub const KIND: &str = "kotal.io/kind";

/// Labels copied verbatim from the backend Service onto its endpoints.
pub const PROPAGATED: [&str; 2] = [PROTOCOL, NETWORK];
