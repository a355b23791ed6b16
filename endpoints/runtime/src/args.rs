use crate::{
    api::EndpointsApi,
    client::Resources,
    core::{
        shared::{ActivityConfig, CacheConfig},
        Config, Endpoints, PortFilter, PublicIdAllocator, ResourceClient, SharedMiddlewares,
        StaticDomain,
    },
    k8s::{IngressRoute, Middleware, Secret, Service},
    server,
};
use anyhow::{bail, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::Duration;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "kotal-endpoints", about = "Exposes tenant node endpoints through the shared proxy")]
pub struct Args {
    #[clap(long, default_value = "kotal=info,warn", env = "KOTAL_ENDPOINTS_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "KOTAL_ENDPOINTS_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "0.0.0.0:8080", env = "KOTAL_ENDPOINTS_API_ADDR")]
    api_addr: SocketAddr,

    /// Domain under which endpoints are served, as `endpoints.<domain>`.
    #[clap(long, env = "KOTAL_DOMAIN_BASE_URL")]
    domain_base_url: String,

    /// Length of the random token in each public path id.
    #[clap(long, default_value = "16", env = "ENDPOINT_PATH_ID_LENGTH")]
    path_id_length: usize,

    #[clap(long, default_value = "websecure", value_delimiter = ',')]
    entry_points: Vec<String>,

    /// TLS secret served for the endpoints host, if the proxy doesn't provide a default.
    #[clap(long)]
    tls_secret_name: Option<String>,

    #[clap(long, default_value = "kotal")]
    shared_middleware_namespace: String,

    /// Service port names that are never exposed.
    #[clap(long, default_value = "ws,p2p", value_delimiter = ',')]
    excluded_port_names: Vec<String>,

    #[clap(flatten)]
    activity: ActivityArgs,

    #[clap(flatten)]
    cache: CacheArgs,

    /// Bounds the Kubernetes API calls made on behalf of a single request.
    #[clap(long, default_value = "10000")]
    request_timeout_ms: u64,

    /// Treats a shared middleware that was created concurrently as success rather than
    /// failing (and rolling back) the endpoint being created.
    #[clap(long)]
    ignore_shared_conflicts: bool,
}

#[derive(Debug, clap::Args)]
struct ActivityArgs {
    #[clap(long = "activity-api-key", env = "CROSSOVER_API_KEY", default_value = "")]
    api_key: String,

    #[clap(long = "activity-pattern", env = "CROSSOVER_PATTERN", default_value = "")]
    pattern: String,

    #[clap(
        long = "activity-remote-address",
        env = "CROSSOVER_REMOTE_ADDRESS",
        default_value = ""
    )]
    remote_address: String,

    #[clap(
        long = "activity-buffer-size",
        env = "CROSSOVER_BUFFER_SIZE",
        default_value = "1000"
    )]
    buffer_size: u32,

    #[clap(
        long = "activity-batch-size",
        env = "CROSSOVER_BATCH_SIZE",
        default_value = "100"
    )]
    batch_size: u32,

    #[clap(
        long = "activity-flush-interval",
        env = "CROSSOVER_FLUSH_INTERVAL",
        default_value = "5s"
    )]
    flush_interval: String,
}

#[derive(Debug, clap::Args)]
struct CacheArgs {
    #[clap(long = "cache-redis-address", env = "CROSSOVER_REDIS_ADDRESS", default_value = "")]
    redis_address: String,

    #[clap(long = "cache-redis-auth", env = "CROSSOVER_REDIS_AUTH", default_value = "")]
    redis_auth: String,

    #[clap(
        long = "cache-redis-pool-size",
        env = "CROSSOVER_REDIS_POOL_SIZE",
        default_value = "10"
    )]
    redis_pool_size: u32,

    /// Seconds a cached response remains valid.
    #[clap(
        long = "cache-expiry",
        env = "CROSSOVER_CACHE_EXPIRY",
        default_value = "15"
    )]
    cache_expiry: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            api_addr,
            domain_base_url,
            path_id_length,
            entry_points,
            tls_secret_name,
            shared_middleware_namespace,
            excluded_port_names,
            activity,
            cache,
            request_timeout_ms,
            ignore_shared_conflicts,
        } = self;

        if path_id_length == 0 {
            bail!("--path-id-length must be positive");
        }

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder())
            .with_client(client)
            .build()
            .await?;

        let config = Config {
            allocator: PublicIdAllocator::new(path_id_length),
            ports: PortFilter::new(excluded_port_names),
            entry_points,
            tls_secret_name,
            shared: SharedMiddlewares {
                namespace: shared_middleware_namespace,
                activity: activity.into(),
                cache: cache.into(),
                ignore_conflicts: ignore_shared_conflicts,
            },
        };

        let client = runtime.client();
        let endpoints = Endpoints::new(
            Arc::new(Resources::<IngressRoute>::new(client.clone())),
            Arc::new(Resources::<Middleware>::new(client.clone())),
            Arc::new(Resources::<Secret>::new(client.clone())),
            Arc::new(StaticDomain::new(domain_base_url)),
            config,
        );
        let services: Arc<dyn ResourceClient<Service>> =
            Arc::new(Resources::<Service>::new(client));
        let api = EndpointsApi::new(
            Arc::new(endpoints),
            services,
            Duration::from_millis(request_timeout_ms),
        );

        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                let srv = server::serve(api_addr, api);
                tokio::pin!(srv);
                tokio::select! {
                    res = &mut srv => {
                        if let Err(error) = res {
                            error!(%error, "Endpoints API server failed");
                        }
                    }
                    _handle = drain.signaled() => {
                        info!("Endpoints API shutting down");
                    }
                }
            }
            .instrument(info_span!("api", port = %api_addr.port())),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

impl From<ActivityArgs> for ActivityConfig {
    fn from(args: ActivityArgs) -> Self {
        let ActivityArgs {
            api_key,
            pattern,
            remote_address,
            buffer_size,
            batch_size,
            flush_interval,
        } = args;
        Self {
            api_key,
            pattern,
            remote_address,
            buffer_size,
            batch_size,
            flush_interval,
        }
    }
}

impl From<CacheArgs> for CacheConfig {
    fn from(args: CacheArgs) -> Self {
        let CacheArgs {
            redis_address,
            redis_auth,
            redis_pool_size,
            cache_expiry,
        } = args;
        Self {
            redis_address,
            redis_auth,
            redis_pool_size,
            cache_expiry,
        }
    }
}
