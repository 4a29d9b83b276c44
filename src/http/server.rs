//! The HTTP server.

use std::convert::Infallible;
use std::error;
use std::sync::Arc;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use log::{debug, log, warn};
use crate::commons::error::Error;
use crate::proxy::ProxyService;
use super::dispatch::{dispatch_request, DispatchError};
use super::request::Request;
use super::response::{HttpResponse, HyperResponse};


//------------ HttpServer ----------------------------------------------------

/// Processes HTTP requests for the proxy service.
pub struct HttpServer {
    service: Arc<ProxyService>,
    post_limit: u64,
    started: DateTime<Utc>,
}

impl HttpServer {
    pub fn new(service: Arc<ProxyService>, post_limit: u64) -> Self {
        HttpServer { service, post_limit, started: Utc::now() }
    }

    pub fn service(&self) -> &ProxyService {
        &self.service
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Processes a single request.
    ///
    /// This never fails: all problems are turned into error responses.
    pub async fn process_request<B>(
        &self, request: hyper::Request<B>,
    ) -> Result<HyperResponse, Infallible>
    where
        B: Body,
        B::Error: Into<Box<dyn error::Error + Send + Sync>>,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match self.read_request(request).await {
            Ok(request) => match dispatch_request(request).await {
                Ok(response) => response,
                Err(DispatchError::Response(response)) => response,
                Err(DispatchError::Proxy(err)) => {
                    self.response_from_error(err).await
                }
            },
            Err(err) => self.response_from_error(err).await,
        };

        if let Some(cause) = response.cause() {
            log!(
                cause.log_level(),
                "{method} {path}: {} ({cause})", response.status()
            );
        }
        else {
            debug!("{method} {path}: {}", response.status());
        }

        Ok(response.into_hyper())
    }

    /// Reads the body of a request.
    async fn read_request<B>(
        &self, request: hyper::Request<B>,
    ) -> Result<Request<'_>, Error>
    where
        B: Body,
        B::Error: Into<Box<dyn error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        // If we know the body is too big from the Content-Length header we
        // can bail out early. Otherwise Limited stops reading at the limit.
        if body.size_hint().lower() > self.post_limit {
            return Err(Error::bad_request("Request body too large"))
        }
        let body: Bytes = Limited::new(
            body, self.post_limit.try_into().unwrap_or(usize::MAX)
        ).collect().await.map_err(|_| {
            Error::bad_request("Cannot read request body")
        })?.to_bytes();

        Ok(Request::new(parts, body, self))
    }

    /// Converts an error into the response for the browser.
    ///
    /// A denied request is answered towards the node so the browser is
    /// sent back there. Only if that fails does the citizen get to see an
    /// error.
    async fn response_from_error(&self, err: Error) -> HttpResponse {
        let Error::RequestDenied { msg, request_id, relay_state } = &err else {
            return HttpResponse::response_from_error(err)
        };
        match self.service.deliver_denial(
            request_id, relay_state.as_deref(), msg
        ).await {
            Ok(location) => {
                HttpResponse::found_after_error(location.as_str(), err)
            }
            Err(deliver_err) => {
                warn!(
                    "Cannot hand denial of request {request_id} to the \
                     node: {deliver_err}"
                );
                HttpResponse::response_from_error(err)
            }
        }
    }
}
