use crate::{
    core::{
        self, Deadline, EndpointRequest, EndpointView, Endpoints, ListFilter, ResourceClient,
        Status,
    },
    k8s::{labels, IngressRoute, ResourceExt, Service},
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Header carrying the caller's tenant id, set by the authenticating proxy in front of the API.
pub const USER_ID_HEADER: &str = "x-user-id";

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Serves endpoint operations over HTTP, scoped to the calling tenant.
#[derive(Clone)]
pub struct EndpointsApi {
    endpoints: Arc<Endpoints>,
    services: Arc<dyn ResourceClient<Service>>,
    timeout: Duration,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] BoxError),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Route {
    Create { namespace: String },
    List { namespace: String },
    Count { namespace: String },
    Get { namespace: String, name: String },
    Delete { namespace: String, name: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    name: String,
    service_name: String,
    #[serde(default)]
    use_basic_auth: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ListQuery {
    protocol: Option<String>,
    network: Option<String>,
    /// 1-based.
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct CountBody {
    count: usize,
}

// === impl EndpointsApi ===

impl<B> tower::Service<Request<B>> for EndpointsApi
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        let Some(route) = Route::parse(req.method(), req.uri().path()) else {
            return Box::pin(future::ready(error_response(
                http::StatusCode::NOT_FOUND,
                "not found",
            )));
        };

        let Some(user_id) = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
        else {
            return Box::pin(future::ready(error_response(
                http::StatusCode::UNAUTHORIZED,
                "missing user id",
            )));
        };

        let api = self.clone();
        Box::pin(async move {
            let deadline = Instant::now() + api.timeout;
            debug!(?route, %user_id);
            match route {
                Route::Create { namespace } => {
                    use bytes::Buf;
                    let bytes = req
                        .into_body()
                        .collect()
                        .await
                        .map_err(|e| Error::Request(e.into()))?
                        .to_bytes();
                    let body: CreateBody = match serde_json::from_reader(bytes.reader()) {
                        Ok(body) => body,
                        Err(error) => {
                            warn!(%error, "Failed to parse request body");
                            return error_response(
                                http::StatusCode::BAD_REQUEST,
                                &error.to_string(),
                            );
                        }
                    };
                    api.create(namespace, user_id, body, deadline).await
                }
                Route::List { namespace } => {
                    let query = match ListQuery::parse(req.uri().query()) {
                        Ok(query) => query,
                        Err(error) => return core_error_response(&error),
                    };
                    api.list(&namespace, user_id, query, deadline).await
                }
                Route::Count { namespace } => api.count(&namespace, user_id, deadline).await,
                Route::Get { namespace, name } => {
                    api.get(&namespace, &name, &user_id, deadline).await
                }
                Route::Delete { namespace, name } => {
                    api.delete(&namespace, &name, &user_id, deadline).await
                }
            }
        })
    }
}

impl EndpointsApi {
    pub fn new(
        endpoints: Arc<Endpoints>,
        services: Arc<dyn ResourceClient<Service>>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            services,
            timeout,
        }
    }

    async fn create(
        self,
        namespace: String,
        user_id: String,
        body: CreateBody,
        deadline: Deadline,
    ) -> Result<Response<Body>, Error> {
        let CreateBody {
            name,
            service_name,
            use_basic_auth,
        } = body;
        let request = EndpointRequest {
            name,
            namespace,
            user_id,
            labels: Default::default(),
            use_basic_auth,
        };
        if let Err(error) = request.validate() {
            return core_error_response(&error);
        }

        let service = match self
            .services
            .get(&request.namespace, &service_name, deadline)
            .await
        {
            Ok(service) => service,
            Err(error) => return core_error_response(&error),
        };

        let created = match self.endpoints.create(&request, &service, deadline).await {
            Ok(created) => created,
            Err(error) => return core_error_response(&error),
        };

        json_response(
            http::StatusCode::CREATED,
            &EndpointView::new(&created.route, created.credentials),
        )
    }

    async fn list(
        self,
        namespace: &str,
        user_id: String,
        query: ListQuery,
        deadline: Deadline,
    ) -> Result<Response<Body>, Error> {
        let filter = ListFilter {
            protocol: query.protocol.clone(),
            network: query.network.clone(),
            user_id: Some(user_id),
        };
        let routes = match self
            .endpoints
            .list(namespace, &filter.selector(), deadline)
            .await
        {
            Ok(routes) => routes,
            Err(error) => return core_error_response(&error),
        };

        let total = routes.len();
        let views = query
            .paginate(routes)
            .iter()
            .map(|route| EndpointView::new(route, None))
            .collect::<Vec<_>>();
        let mut rsp = json_response(http::StatusCode::OK, &views)?;
        rsp.headers_mut().insert(TOTAL_COUNT_HEADER, total.into());
        Ok(rsp)
    }

    async fn count(
        self,
        namespace: &str,
        user_id: String,
        deadline: Deadline,
    ) -> Result<Response<Body>, Error> {
        let filter = ListFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        let count = match self
            .endpoints
            .count(namespace, &filter.selector(), deadline)
            .await
        {
            Ok(count) => count,
            Err(error) => return core_error_response(&error),
        };

        let mut rsp = json_response(http::StatusCode::OK, &CountBody { count })?;
        rsp.headers_mut().insert(TOTAL_COUNT_HEADER, count.into());
        Ok(rsp)
    }

    async fn get(
        self,
        namespace: &str,
        name: &str,
        user_id: &str,
        deadline: Deadline,
    ) -> Result<Response<Body>, Error> {
        let route = match self.owned_route(namespace, name, user_id, deadline).await {
            Ok(route) => route,
            Err(error) => return core_error_response(&error),
        };
        let credentials = match self.endpoints.credentials(namespace, name, deadline).await {
            Ok(credentials) => credentials,
            Err(error) => return core_error_response(&error),
        };
        json_response(
            http::StatusCode::OK,
            &EndpointView::new(&route, credentials),
        )
    }

    async fn delete(
        self,
        namespace: &str,
        name: &str,
        user_id: &str,
        deadline: Deadline,
    ) -> Result<Response<Body>, Error> {
        if let Err(error) = self.owned_route(namespace, name, user_id, deadline).await {
            return core_error_response(&error);
        }
        if let Err(error) = self.endpoints.delete(namespace, name, deadline).await {
            return core_error_response(&error);
        }
        Ok(Response::builder()
            .status(http::StatusCode::NO_CONTENT)
            .body(Body::default())
            .expect("no content response must be valid"))
    }

    /// Fetches a route, hiding routes that belong to other tenants.
    async fn owned_route(
        &self,
        namespace: &str,
        name: &str,
        user_id: &str,
        deadline: Deadline,
    ) -> core::Result<IngressRoute> {
        let route = self.endpoints.get(namespace, name, deadline).await?;
        if !is_owned_by(&route, user_id) {
            debug!(%namespace, %name, "Endpoint belongs to another tenant");
            return Err(core::Error::not_found("IngressRoute", name));
        }
        Ok(route)
    }
}

fn is_owned_by(route: &IngressRoute, user_id: &str) -> bool {
    route.labels().get(labels::USER_ID).map(String::as_str) == Some(user_id)
}

// === impl Route ===

impl Route {
    fn parse(method: &http::Method, path: &str) -> Option<Self> {
        let segments = path
            .trim_matches('/')
            .split('/')
            .collect::<Vec<_>>();
        let (namespace, rest) = match segments.as_slice() {
            ["namespaces", namespace, "endpoints", rest @ ..] if !namespace.is_empty() => {
                (namespace.to_string(), rest)
            }
            _ => return None,
        };

        let name = match rest {
            [] if method == http::Method::POST => return Some(Self::Create { namespace }),
            [] if method == http::Method::GET => return Some(Self::List { namespace }),
            ["count"] if method == http::Method::GET => return Some(Self::Count { namespace }),
            [name] if !name.is_empty() => name.to_string(),
            _ => return None,
        };
        if method == http::Method::GET {
            Some(Self::Get { namespace, name })
        } else if method == http::Method::DELETE {
            Some(Self::Delete { namespace, name })
        } else {
            None
        }
    }
}

// === impl ListQuery ===

impl ListQuery {
    fn parse(query: Option<&str>) -> core::Result<Self> {
        let mut parsed = Self::default();
        let Some(query) = query else {
            return Ok(parsed);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "protocol" => parsed.protocol = Some(value.into_owned()),
                "network" => parsed.network = Some(value.into_owned()),
                "page" => parsed.page = Some(parse_positive("page", &value)?),
                "limit" => parsed.limit = Some(parse_positive("limit", &value)?),
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Selects the requested page. Without a limit every item is returned.
    fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let Some(limit) = self.limit else {
            return items;
        };
        let page = self.page.unwrap_or(1);
        items
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect()
    }
}

fn parse_positive(param: &str, value: &str) -> core::Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(core::Error::validation(format_args!(
            "{param} must be a positive integer"
        ))),
    }
}

fn status_code(status: Status) -> http::StatusCode {
    match status {
        Status::NotFound => http::StatusCode::NOT_FOUND,
        Status::Conflict => http::StatusCode::CONFLICT,
        Status::Validation => http::StatusCode::BAD_REQUEST,
        Status::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn core_error_response(error: &core::Error) -> Result<Response<Body>, Error> {
    let status = status_code(error.status());
    if status.is_server_error() {
        warn!(%error, "Request failed");
    } else {
        debug!(%error, "Request rejected");
    }
    error_response(status, &error.to_string())
}

fn error_response(status: http::StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &ErrorBody { error: message })
}

fn json_response<T: Serialize>(
    status: http::StatusCode,
    body: &T,
) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}
