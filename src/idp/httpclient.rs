//! The HTTP client handed to the OpenID Connect library.
//!
//! All traffic with the IdP passes through [`IdpHttpClient::execute`] which
//! bounds every request with the upstream timeout, never follows redirects
//! and can log requests and responses at trace level. The bodies contain
//! codes and tokens, so the logging config keeps this module's target
//! below trace unless `oidc.http_debug_log_enabled` is set.

use std::str::FromStr;
use std::time::Duration;
use log::{log_enabled, trace, Level};
use openidconnect::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use openidconnect::http::{HeaderMap, StatusCode};
use openidconnect::{HttpRequest, HttpResponse};
use crate::commons::error::Error;
use crate::commons::httpclient;


//------------ IdpHttpClient -------------------------------------------------

#[derive(Clone, Debug)]
pub struct IdpHttpClient {
    client: reqwest::Client,
    issuer: String,
}

impl IdpHttpClient {
    /// Creates a client for talking to the IdP at `issuer`.
    pub fn new(issuer: &str, timeout: Duration) -> Result<Self, Error> {
        // Following redirects would let the IdP point us anywhere.
        let client = httpclient::client_with_tweaks(issuer, timeout, false)?;
        Ok(IdpHttpClient { client, issuer: issuer.to_string() })
    }

    /// Performs a request on behalf of the OpenID Connect library.
    pub async fn execute(
        &self, request: HttpRequest
    ) -> Result<HttpResponse, Error> {
        let uri = request.url.to_string();
        if log_enabled!(Level::Trace) {
            trace!(
                "IdP request: {} {} headers: {:?} body: {}",
                request.method, uri,
                redacted(&request.headers), readable(&request.body)
            );
        }

        let res = self.dispatch(&uri, request).await;

        if log_enabled!(Level::Trace) {
            match &res {
                Ok(res) => trace!(
                    "IdP response from {}: {} headers: {:?} body: {}",
                    uri, res.status_code, res.headers, readable(&res.body)
                ),
                Err(err) => trace!("IdP request to {} failed: {}", uri, err),
            }
        }

        res.map_err(Error::HttpClientError)
    }

    async fn dispatch(
        &self, uri: &str, request: HttpRequest
    ) -> Result<HttpResponse, httpclient::Error> {
        let method = reqwest::Method::from_str(
            request.method.as_str()
        ).map_err(|_| {
            httpclient::Error::request_build(
                uri, format!("invalid method: {}", request.method)
            )
        })?;

        let mut builder = self.client.request(method, uri).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        let request = builder.build().map_err(|err| {
            httpclient::Error::request_build(uri, err)
        })?;

        let response = self.client.execute(request).await.map_err(|err| {
            httpclient::Error::execute(uri, err)
        })?;

        let status_code = StatusCode::from_u16(
            response.status().as_u16()
        ).map_err(|_| {
            httpclient::Error::response(
                uri, format!("invalid status code: {}", response.status())
            )
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            let name = HeaderName::from_str(name.as_str()).map_err(|_| {
                httpclient::Error::response(
                    uri, format!("invalid header name: {name}")
                )
            })?;
            let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| {
                httpclient::Error::response(
                    uri, format!("invalid value for header: {name}")
                )
            })?;
            headers.append(name, value);
        }

        let body = response.bytes().await.map_err(|err| {
            httpclient::Error::response(
                uri, format!("could not get response body: {err}")
            )
        })?;

        Ok(HttpResponse { status_code, headers, body: body.to_vec() })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}


//------------ Helpers -------------------------------------------------------

/// Renders a body as text if possible.
///
/// The debug output of a byte vector is a list of integers which nobody
/// can read.
fn readable(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<{} bytes of binary data>", body.len()),
    }
}

/// Returns the headers with the client credentials blanked out.
fn redacted(headers: &HeaderMap) -> HeaderMap {
    let mut res = headers.clone();
    if res.contains_key(AUTHORIZATION) {
        res.insert(AUTHORIZATION, HeaderValue::from_static("<redacted>"));
    }
    res
}


//============ Tests =========================================================
