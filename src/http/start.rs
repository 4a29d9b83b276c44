//! Starting the HTTP listeners.

use std::net::SocketAddr;
use std::sync::Arc;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use crate::commons::error::Error;
use crate::config::Config;
use crate::proxy::ProxyService;
use super::server::HttpServer;


/// Runs the proxy until one of its listeners fails.
///
/// If `signal_running` is given, it is notified once the first listener
/// is bound.
pub async fn start_proxy_daemon(
    config: Arc<Config>,
    service: Arc<ProxyService>,
    mut signal_running: Option<oneshot::Sender<()>>,
) -> Result<(), Error> {
    let server = Arc::new(HttpServer::new(service, config.post_limit));

    let server_futures = futures_util::future::select_all(
        config.socket_addresses().into_iter().map(|socket_addr| {
            tokio::spawn(single_http_listener(
                server.clone(),
                socket_addr,
                signal_running.take(),
            ))
        }),
    );

    let _ = server_futures.await;
    error!("http server stopped unexpectedly");
    Err(Error::custom("stopping proxy process"))
}

/// Runs an HTTP listener on a single socket.
async fn single_http_listener(
    server: Arc<HttpServer>,
    addr: SocketAddr,
    signal_running: Option<oneshot::Sender<()>>,
) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Could not bind to {addr}: {err}");
            return;
        }
    };
    info!("Listening on http://{addr}");

    if let Some(tx) = signal_running {
        let _ = tx.send(());
    }

    loop {
        let stream = match listener.accept().await {
            Ok((stream, _addr)) => stream,
            Err(err) => {
                error!("Fatal error in HTTP server {addr}: {err}");
                return;
            }
        };
        let server = server.clone();
        tokio::task::spawn(async move {
            let res = hyper_util::server::conn::auto::Builder::new(
                TokioExecutor::new(),
            )
            .serve_connection(
                TokioIo::new(stream),
                service_fn(move |req| {
                    let server = server.clone();
                    async move { server.process_request(req).await }
                }),
            )
            .await;
            if let Err(err) = res {
                debug!("HTTP connection closed with error: {err}");
            }
        });
    }
}
