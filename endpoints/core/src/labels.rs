use crate::k8s::labels::{self, Map};

/// Derives an endpoint's kind from its backend's component label: the last hyphen-delimited
/// segment, e.g. `ethereum-node-api` yields `api`.
///
/// A component without hyphens is its own kind. Nothing is derived when the label is absent or
/// its last segment is empty.
pub fn derive_kind(component: Option<&str>) -> Option<&str> {
    let kind = component?.rsplit('-').next()?;
    if kind.is_empty() {
        return None;
    }
    Some(kind)
}

/// Computes the labels of an endpoint exposing a backend labeled `backend`.
///
/// `desired` labels are applied first so that the labels this backend relies on for scoping
/// and ownership can't be overridden.
pub fn endpoint_labels(backend: &Map, tenant_id: &str, desired: &Map) -> Map {
    let mut out = desired.clone();
    for key in labels::PROPAGATED {
        if let Some(value) = backend.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    out.insert(
        labels::CREATED_BY.to_string(),
        labels::CREATED_BY_VALUE.to_string(),
    );
    out.insert(labels::USER_ID.to_string(), tenant_id.to_string());
    match derive_kind(backend.get(labels::COMPONENT).map(String::as_str)) {
        Some(kind) => {
            out.insert(labels::KIND.to_string(), kind.to_string());
        }
        None => {
            out.remove(labels::KIND);
        }
    }
    out
}
