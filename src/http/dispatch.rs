//! Dispatching of HTTP requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::commons::error::Error;
use crate::constants::{
    CONSENT_ENDPOINT, CSRF_COOKIE_NAME, IDP_RESPONSE_ENDPOINT,
    PROXY_SERVER_APP, PROXY_SERVICE_REQUEST_ENDPOINT, PROXY_VERSION,
};
use crate::light::token::is_token_syntax;
use crate::proxy::response_flow::{CallbackOutcome, IdpCallback};
use super::request::Request;
use super::response::HttpResponse;


//------------ DispatchError -------------------------------------------------

/// An error occured during dispatch.
///
/// This allows using the question mark operator for both ready-made
/// responses and proxy errors. The latter are turned into responses by the
/// server which may need to talk to the node for that.
#[derive(Debug)]
pub enum DispatchError {
    /// A response should be sent to the client.
    Response(HttpResponse),

    /// Processing failed.
    Proxy(Error),
}

impl From<HttpResponse> for DispatchError {
    fn from(src: HttpResponse) -> Self {
        Self::Response(src)
    }
}

impl From<Error> for DispatchError {
    fn from(src: Error) -> Self {
        Self::Proxy(src)
    }
}


//------------ / -------------------------------------------------------------

pub async fn dispatch_request(
    request: Request<'_>,
) -> Result<HttpResponse, DispatchError> {
    let path = request.path()?.into_owned();
    match path.strip_prefix('/').unwrap_or(&path) {
        PROXY_SERVICE_REQUEST_ENDPOINT => proxy_service_request(request).await,
        IDP_RESPONSE_ENDPOINT => idp_response(request).await,
        CONSENT_ENDPOINT => consent(request).await,
        "heartbeat" => heartbeat(request),
        _ => Ok(HttpResponse::not_found())
    }
}


//------------ /ProxyServiceRequest ------------------------------------------

async fn proxy_service_request(
    request: Request<'_>,
) -> Result<HttpResponse, DispatchError> {
    request.check_get_or_post()?;
    let params = request.params();
    let token = token_param(params.required("token")?)?;
    let redirect = request.server().service().handle_proxy_request(
        token
    ).await?;
    Ok(HttpResponse::found_with_cookie(
        redirect.location.as_str(), redirect.set_cookie
    ))
}


//------------ /IdpResponse --------------------------------------------------

async fn idp_response(
    request: Request<'_>,
) -> Result<HttpResponse, DispatchError> {
    request.check_get()?;
    let params = request.params();
    let callback = IdpCallback {
        state: params.required("state")?.to_string(),
        code: params.single("code")?.map(Into::into),
        error: params.single("error")?.map(Into::into),
        error_description: params.single(
            "error_description"
        )?.map(Into::into),
    };
    let cookie = request.cookie(CSRF_COOKIE_NAME).ok_or_else(|| {
        Error::bad_request(format!(
            "Missing request cookie '{CSRF_COOKIE_NAME}'"
        ))
    })?;

    match request.server().service().handle_idp_response(
        callback, Some(&cookie)
    ).await? {
        CallbackOutcome::AwaitingConsent(view) => {
            Ok(HttpResponse::html(view.render_html()))
        }
        CallbackOutcome::Delivered(location) => {
            Ok(HttpResponse::found(location.as_str()))
        }
    }
}


//------------ /Consent ------------------------------------------------------

async fn consent(
    request: Request<'_>,
) -> Result<HttpResponse, DispatchError> {
    request.check_get()?;
    let params = request.params();
    let token = token_param(params.required("token")?)?;
    let cancel = match params.single("cancel")? {
        None | Some("false") => false,
        Some("true") => true,
        Some(_) => {
            return Err(Error::bad_request(
                "Parameter 'cancel' must be 'true' or 'false'"
            ).into())
        }
    };
    let location = request.server().service().handle_consent(
        token, cancel
    ).await?;
    Ok(HttpResponse::found(location.as_str()))
}


//------------ /heartbeat ----------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Heartbeat {
    status: &'static str,
    name: &'static str,
    version: &'static str,
    current_time: DateTime<Utc>,
    start_time: DateTime<Utc>,
    up_time: i64,
}

fn heartbeat(
    request: Request<'_>,
) -> Result<HttpResponse, DispatchError> {
    request.check_get()?;
    let now = Utc::now();
    let started = request.server().started();
    Ok(HttpResponse::json(&Heartbeat {
        status: "UP",
        name: PROXY_SERVER_APP,
        version: PROXY_VERSION,
        current_time: now,
        start_time: started,
        up_time: (now - started).num_seconds(),
    }))
}


//------------ Helpers -------------------------------------------------------

fn token_param(token: &str) -> Result<&str, Error> {
    if is_token_syntax(token) {
        Ok(token)
    }
    else {
        Err(Error::bad_request("Parameter 'token': only base64 characters allowed"))
    }
}
