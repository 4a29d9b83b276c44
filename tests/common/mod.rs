#![allow(dead_code)] // Different tests use different parts.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, StatusCode};
use hyper::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use eidas_proxy::constants::CSRF_COOKIE_NAME;
use eidas_proxy::http::response::HyperResponse;
use eidas_proxy::test::{query_param, TestProxy};


//------------ Logging -------------------------------------------------------

pub fn init_logging() {
    let _ = stderrlog::new().verbosity(99).init();
}


//------------ Requests ------------------------------------------------------

/// Builds a request without a body.
pub fn get(uri: &str, cookie: Option<&str>) -> hyper::Request<Full<Bytes>> {
    request(Method::GET, uri, cookie, Bytes::new())
}

/// Builds a POST request with a form body.
pub fn post_form(uri: &str, form: &str) -> hyper::Request<Full<Bytes>> {
    hyper::Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from(form.to_string()))).unwrap()
}

pub fn request(
    method: Method, uri: &str, cookie: Option<&str>, body: Bytes,
) -> hyper::Request<Full<Bytes>> {
    let mut builder = hyper::Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("{CSRF_COOKIE_NAME}={cookie}"));
    }
    builder.body(Full::new(body)).unwrap()
}

/// Percent-encodes a query parameter value.
pub fn enc(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}


//------------ Responses -----------------------------------------------------

pub async fn call(
    proxy: &TestProxy, request: hyper::Request<Full<Bytes>>
) -> HyperResponse {
    proxy.server.process_request(request).await.unwrap()
}

pub fn location(response: &HyperResponse) -> String {
    response.headers().get(LOCATION).expect("no location header")
        .to_str().unwrap().to_string()
}

pub fn set_cookie(response: &HyperResponse) -> Option<String> {
    response.headers().get(SET_COOKIE).map(|value| {
        value.to_str().unwrap().to_string()
    })
}

pub async fn body_string(response: HyperResponse) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn error_label(response: HyperResponse) -> String {
    let body = body_string(response).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    json["label"].as_str().unwrap().to_string()
}


//------------ Flows ---------------------------------------------------------

/// An authentication that was sent off to the IdP.
pub struct Started {
    pub state: String,
    pub cookie: String,
}

/// Runs the first hop for a request and returns the state.
pub async fn start_authentication(
    proxy: &TestProxy, request: eidas_proxy::light::LightRequest
) -> Started {
    let token = proxy.put_request(request).await;
    let response = call(proxy, get(
        &format!("/ProxyServiceRequest?token={}", enc(&token)), None
    )).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let state = query_param(&location(&response), "state").unwrap();
    let cookie = set_cookie(&response).unwrap();
    let cookie = cookie.split(';').next().unwrap()
        .strip_prefix(&format!("{CSRF_COOKIE_NAME}=")).unwrap()
        .to_string();
    Started { state, cookie }
}

pub fn callback_uri(state: &str, code: &str) -> String {
    format!("/IdpResponse?state={}&code={}", enc(state), enc(code))
}
