#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Kubernetes-backed resource clients.

use k8s_openapi::NamespaceResourceScope;
use kotal_endpoints_core::{Deadline, Error, ResourceClient, Result, Selector};
use kotal_endpoints_k8s_api::{
    self as k8s, Api, DeleteParams, ListParams, PostParams, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, future::Future, marker::PhantomData};
use tokio::time;
use tracing::trace;

pub const FIELD_MANAGER: &str = "kotal-api";

/// Accesses one namespaced resource kind through the Kubernetes API.
pub struct Resources<K> {
    client: k8s::Client,
    _kind: PhantomData<fn() -> K>,
}

// === impl Resources ===

impl<K> Resources<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn new(client: k8s::Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(FIELD_MANAGER.to_string()),
        }
    }
}

impl<K> Clone for Resources<K> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _kind: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<K> ResourceClient<K> for Resources<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + fmt::Debug + DeserializeOwned + Serialize + Send + Sync + 'static,
{
    async fn create(&self, resource: &K, deadline: Deadline) -> Result<K> {
        let (namespace, name) = namespaced_name(resource)?;
        trace!(?resource, "Creating");
        call::<K, _>(
            deadline,
            &namespace,
            &name,
            self.api(&namespace).create(&Self::post_params(), resource),
        )
        .await
    }

    async fn get(&self, namespace: &str, name: &str, deadline: Deadline) -> Result<K> {
        call::<K, _>(deadline, namespace, name, self.api(namespace).get(name)).await
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
        deadline: Deadline,
    ) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }
        let list = call::<K, _>(deadline, namespace, "", self.api(namespace).list(&params)).await?;
        Ok(list.items)
    }

    async fn update(&self, resource: &K, deadline: Deadline) -> Result<K> {
        let (namespace, name) = namespaced_name(resource)?;
        call::<K, _>(
            deadline,
            &namespace,
            &name,
            self.api(&namespace)
                .replace(&name, &Self::post_params(), resource),
        )
        .await
    }

    async fn delete(&self, namespace: &str, name: &str, deadline: Deadline) -> Result<()> {
        // Background propagation lets the garbage collector remove owned resources.
        call::<K, _>(
            deadline,
            namespace,
            name,
            self.api(namespace).delete(name, &DeleteParams::background()),
        )
        .await?;
        Ok(())
    }
}

fn namespaced_name<K>(resource: &K) -> Result<(String, String)>
where
    K: Resource<DynamicType = ()>,
{
    let namespace = resource.namespace().ok_or_else(|| {
        Error::validation(format_args!(
            "{} {} must have a namespace",
            K::kind(&()),
            resource.name_any()
        ))
    })?;
    Ok((namespace, resource.name_any()))
}

/// Awaits an API call until the deadline, normalizing its failure.
async fn call<K, T>(
    deadline: Deadline,
    namespace: &str,
    name: &str,
    request: impl Future<Output = Result<T, k8s::Error>>,
) -> Result<T>
where
    K: Resource<DynamicType = ()>,
{
    match time::timeout_at(deadline, request).await {
        Ok(Ok(rsp)) => Ok(rsp),
        Ok(Err(error)) => Err(normalize::<K>(error, namespace, name)),
        Err(_) => Err(Error::internal(format_args!(
            "{} {namespace}/{name}: request timed out",
            K::kind(&())
        ))),
    }
}

/// Maps a Kubernetes API failure onto the error taxonomy.
pub fn normalize<K>(error: k8s::Error, namespace: &str, name: &str) -> Error
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let id = format!("{namespace}/{name}");
    match error {
        k8s::Error::Api(rsp) => match rsp.code {
            404 => Error::not_found(kind, id),
            409 => Error::conflict(kind, id),
            400 | 422 => Error::validation(rsp.message),
            _ => internal(k8s::Error::Api(rsp), &kind, &id),
        },
        error => internal(error, &kind, &id),
    }
}

fn internal(error: k8s::Error, kind: &str, id: &str) -> Error {
    Error::Internal(anyhow::Error::new(error).context(format!("{kind} {id}")))
}
