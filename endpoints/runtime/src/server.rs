use crate::api::EndpointsApi;
use anyhow::Result;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, Instrument};

/// Serves the endpoints API over HTTP/1.
///
/// Only returns if the listener can't be bound. Each connection is served on its own task.
pub(crate) async fn serve(addr: SocketAddr, api: EndpointsApi) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Endpoints API listening");

    loop {
        let (stream, client) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                debug!(%error, "Failed to accept connection");
                continue;
            }
        };

        let service = TowerToHyperService::new(api.clone());
        tokio::spawn(
            async move {
                let conn = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service);
                if let Err(error) = conn.await {
                    debug!(%error, "Connection closed");
                }
            }
            .instrument(info_span!("conn", %client)),
        );
    }
}
