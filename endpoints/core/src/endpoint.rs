//! Provisions and queries endpoints.
//!
//! An endpoint is not a resource of its own: it's an `IngressRoute` plus the resources it owns.
//! Provisioning creates several independent resources, so it cannot be atomic. Instead, once
//! the route exists it is the single rollback target: if any later step fails, the route is
//! deleted and garbage collection removes whatever was already created under it. Shared
//! middlewares are never rolled back.

use crate::{
    allocator::{self, PublicIdAllocator},
    k8s::{labels::Map, IngressRoute, Middleware, ResourceExt, Secret, Service},
    labels, resources, Deadline, DomainLookup, Error, PortFilter, ResourceClient, Result,
    Selector, SharedMiddlewares,
};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::time;
use tracing::{error, info, instrument, warn};

/// Describes an endpoint to be created for a backend Service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointRequest {
    pub name: String,
    pub namespace: String,
    /// The tenant creating the endpoint.
    pub user_id: String,
    pub labels: Map,
    pub use_basic_auth: bool,
}

/// A fully provisioned endpoint.
#[derive(Clone, Debug)]
pub struct Created {
    pub route: IngressRoute,
    /// The generated basic-auth credentials, when basic auth was requested.
    pub credentials: Option<Credentials>,
}

/// A Service port made publicly addressable under `/{public_id}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposedPort {
    pub public_id: String,
    pub port_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub allocator: PublicIdAllocator,
    pub ports: PortFilter,
    pub entry_points: Vec<String>,
    pub tls_secret_name: Option<String>,
    pub shared: SharedMiddlewares,
}

pub struct Endpoints {
    routes: Arc<dyn ResourceClient<IngressRoute>>,
    middlewares: Arc<dyn ResourceClient<Middleware>>,
    secrets: Arc<dyn ResourceClient<Secret>>,
    domain: Arc<dyn DomainLookup>,
    config: Config,
}

/// The provisioning steps that follow the route's creation, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    StripPrefix,
    Secret,
    BasicAuth,
    Activity,
    Cache,
}

// === impl EndpointRequest ===

impl EndpointRequest {
    /// The longest name derived from an endpoint's name is its strip-prefix middleware.
    const MAX_NAME_LEN: usize = 63 - "strip-prefix-".len();

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        if self.name.len() > Self::MAX_NAME_LEN {
            return Err(Error::validation(format_args!(
                "name must be at most {} characters",
                Self::MAX_NAME_LEN
            )));
        }
        let valid_chars = self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || self.name.starts_with('-') || self.name.ends_with('-') {
            return Err(Error::validation(format_args!(
                "name {:?} must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character",
                self.name
            )));
        }
        if self.namespace.is_empty() {
            return Err(Error::validation("namespace must not be empty"));
        }
        if self.user_id.is_empty() {
            return Err(Error::validation("user id must not be empty"));
        }
        Ok(())
    }
}

// === impl ExposedPort ===

impl ExposedPort {
    /// Recovers the exposed ports of a route, in route order.
    pub fn from_route(route: &IngressRoute) -> Vec<Self> {
        route
            .spec
            .routes
            .iter()
            .filter_map(|r| {
                let public_id = r.path_prefix()?.to_string();
                let port_name = r.services.first()?.port.to_string();
                Some(Self {
                    public_id,
                    port_name,
                })
            })
            .collect()
    }
}

// === impl Credentials ===

impl Credentials {
    pub const LEN: usize = 8;

    pub fn generate() -> Self {
        Self {
            username: allocator::random_string(Self::LEN),
            password: allocator::random_string(Self::LEN),
        }
    }

    fn from_secret(secret: &Secret) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            if let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) {
                return String::from_utf8(value.0.clone())
                    .map_err(|e| Error::internal(format_args!("invalid secret {key}: {e}")));
            }
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get(key))
                .cloned()
                .ok_or_else(|| {
                    Error::internal(format_args!(
                        "Secret {} is missing {key}",
                        secret.name_any()
                    ))
                })
        };
        Ok(Self {
            username: field("username")?,
            password: field("password")?,
        })
    }
}

// === impl Stage ===

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StripPrefix => "strip-prefix middleware",
            Self::Secret => "basic-auth secret",
            Self::BasicAuth => "basic-auth middleware",
            Self::Activity => "shared activity middleware",
            Self::Cache => "shared cache middleware",
        })
    }
}

// === impl Endpoints ===

impl Endpoints {
    /// Compensation gets at least this much time, even when the failure it compensates for was
    /// the caller's deadline expiring.
    const COMPENSATION_TIMEOUT: time::Duration = time::Duration::from_secs(5);

    pub fn new(
        routes: Arc<dyn ResourceClient<IngressRoute>>,
        middlewares: Arc<dyn ResourceClient<Middleware>>,
        secrets: Arc<dyn ResourceClient<Secret>>,
        domain: Arc<dyn DomainLookup>,
        config: Config,
    ) -> Self {
        Self {
            routes,
            middlewares,
            secrets,
            domain,
            config,
        }
    }

    /// Creates an endpoint exposing `service`'s eligible ports.
    ///
    /// Either every resource is created, or the route is deleted before returning the error.
    /// When that deletion fails too, its error is returned instead since the route is then
    /// orphaned.
    #[instrument(skip_all, fields(namespace = %request.namespace, name = %request.name))]
    pub async fn create(
        &self,
        request: &EndpointRequest,
        service: &Service,
        deadline: Deadline,
    ) -> Result<Created> {
        request.validate()?;

        let port_names = self.config.ports.eligible(service);
        if port_names.is_empty() {
            return Err(Error::validation(format_args!(
                "Service {} exposes no eligible ports",
                service.name_any()
            )));
        }

        let domain = self.domain.base_url().await?;
        let ports = self
            .config
            .allocator
            .allocate(port_names.len(), &request.user_id)
            .into_iter()
            .zip(port_names)
            .map(|(public_id, port_name)| ExposedPort {
                public_id,
                port_name,
            })
            .collect::<Vec<_>>();

        let shared = self.config.shared.refs();
        let route = resources::ingress_route(resources::RouteParams {
            request,
            service,
            ports: &ports,
            labels: labels::endpoint_labels(
                service.labels(),
                &request.user_id,
                &request.labels,
            ),
            host: &resources::endpoints_host(&domain),
            entry_points: &self.config.entry_points,
            tls_secret_name: self.config.tls_secret_name.as_deref(),
            shared: &shared,
        });

        // Nothing needs to be undone if the route can't be created.
        let route = self.routes.create(&route, deadline).await?;
        info!(ports = ports.len(), "Created IngressRoute");

        match self.provision(request, &route, deadline).await {
            Ok(credentials) => Ok(Created { route, credentials }),
            Err((stage, error)) => Err(self.compensate(&route, stage, error, deadline).await),
        }
    }

    async fn provision(
        &self,
        request: &EndpointRequest,
        route: &IngressRoute,
        deadline: Deadline,
    ) -> Result<Option<Credentials>, (Stage, Error)> {
        let owner = resources::owner_reference(route).map_err(|e| (Stage::StripPrefix, e))?;

        self.middlewares
            .create(&resources::strip_prefix(route, &owner), deadline)
            .await
            .map_err(|e| (Stage::StripPrefix, e))?;

        let credentials = if request.use_basic_auth {
            let credentials = Credentials::generate();
            self.secrets
                .create(
                    &resources::basic_auth_secret(route, &owner, &credentials),
                    deadline,
                )
                .await
                .map_err(|e| (Stage::Secret, e))?;
            self.middlewares
                .create(&resources::basic_auth_middleware(route, &owner), deadline)
                .await
                .map_err(|e| (Stage::BasicAuth, e))?;
            Some(credentials)
        } else {
            None
        };

        let shared = &self.config.shared;
        shared
            .ensure_activity(&*self.middlewares, deadline)
            .await
            .map_err(|e| (Stage::Activity, e))?;
        shared
            .ensure_cache(&*self.middlewares, deadline)
            .await
            .map_err(|e| (Stage::Cache, e))?;

        Ok(credentials)
    }

    /// Deletes the route after `stage` failed, returning the error to report.
    async fn compensate(
        &self,
        route: &IngressRoute,
        stage: Stage,
        error: Error,
        deadline: Deadline,
    ) -> Error {
        let namespace = route.namespace().unwrap_or_default();
        let name = route.name_any();
        warn!(%stage, %error, "Provisioning failed; deleting IngressRoute");

        let deadline = deadline.max(time::Instant::now() + Self::COMPENSATION_TIMEOUT);
        match self.routes.delete(&namespace, &name, deadline).await {
            Ok(()) => error,
            Err(delete_error) => {
                error!(
                    %stage,
                    %error,
                    error.delete = %delete_error,
                    "Failed to delete IngressRoute; it is orphaned"
                );
                delete_error
            }
        }
    }

    pub async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
        deadline: Deadline,
    ) -> Result<Vec<IngressRoute>> {
        self.routes.list(namespace, selector, deadline).await
    }

    pub async fn get(
        &self,
        namespace: &str,
        name: &str,
        deadline: Deadline,
    ) -> Result<IngressRoute> {
        self.routes.get(namespace, name, deadline).await
    }

    /// Deletes an endpoint's route. Owned resources are garbage collected; shared middlewares
    /// remain.
    #[instrument(skip(self, deadline))]
    pub async fn delete(&self, namespace: &str, name: &str, deadline: Deadline) -> Result<()> {
        self.routes.delete(namespace, name, deadline).await?;
        info!("Deleted IngressRoute");
        Ok(())
    }

    /// Counts matching endpoints by listing them.
    pub async fn count(
        &self,
        namespace: &str,
        selector: &Selector,
        deadline: Deadline,
    ) -> Result<usize> {
        Ok(self.list(namespace, selector, deadline).await?.len())
    }

    /// Reads an endpoint's basic-auth credentials, if it has any.
    pub async fn credentials(
        &self,
        namespace: &str,
        name: &str,
        deadline: Deadline,
    ) -> Result<Option<Credentials>> {
        let secret = match self
            .secrets
            .get(namespace, &resources::secret_name(name), deadline)
            .await
        {
            Ok(secret) => secret,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };
        Credentials::from_secret(&secret).map(Some)
    }
}
