//! Defines all proxy server side errors.

use std::{error, fmt, io};
use std::collections::HashMap;
use hyper::StatusCode;
use log::Level;
use serde::{Deserialize, Serialize};
use super::httpclient;


//------------ ErrorResponse -------------------------------------------------

/// The JSON body returned to the browser for a failed request.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// The error label.
    pub label: String,

    /// The error message.
    pub msg: String,

    /// Arguments with details about the error.
    pub args: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(label: &str, msg: impl fmt::Display) -> Self {
        ErrorResponse {
            label: label.to_string(),
            msg: msg.to_string(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_cause(self, cause: impl fmt::Display) -> Self {
        self.with_arg("cause", cause)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.msg)
    }
}


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    //-----------------------------------------------------------------
    // Request Issues
    //-----------------------------------------------------------------

    /// Malformed, missing, or contradictory input.
    ///
    /// Never carries a request id: the request may not be trusted enough
    /// to answer the node on its behalf.
    BadRequest(String),

    /// A policy rejection or a cancellation by the citizen.
    ///
    /// The node is answered with a failure response for `request_id`
    /// echoing the request's relay state.
    RequestDenied {
        msg: String,
        request_id: String,
        relay_state: Option<String>,
    },

    //-----------------------------------------------------------------
    // Protocol Issues
    //-----------------------------------------------------------------

    /// A protocol invariant was violated, e.g., a CSRF mismatch.
    IllegalState(String),

    /// The IdP answered the authentication request with an error other
    /// than the citizen cancelling.
    UpstreamProtocolError { error: String, description: Option<String> },

    /// Exchanging the authorization code for an identity failed.
    IdpExchange(String),

    /// A bounded call to a collaborator did not complete in time.
    UpstreamTimeout(&'static str),

    //-----------------------------------------------------------------
    // System Issues
    //-----------------------------------------------------------------
    IoError(io::Error),
    JsonError(serde_json::Error),
    HttpClientError(httpclient::Error),
    StoreError(String),
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Error::RequestDenied { msg, request_id, .. } => {
                write!(f, "Request '{request_id}' denied: {msg}")
            }
            Error::IllegalState(msg) => write!(f, "Illegal state: {msg}"),
            Error::UpstreamProtocolError { error, description } => {
                write!(
                    f,
                    "OIDC authentication request has returned an error \
                     (code = '{}', description = '{}')",
                    error,
                    description.as_deref().unwrap_or("null")
                )
            }
            Error::IdpExchange(msg) => {
                write!(f, "Identity provider exchange failed: {msg}")
            }
            Error::UpstreamTimeout(what) => {
                write!(f, "Timed out waiting for {what}")
            }
            Error::IoError(e) => write!(f, "I/O error: {e}"),
            Error::JsonError(e) => write!(f, "Invalid JSON: {e}"),
            Error::HttpClientError(e) => write!(f, "HTTP client error: {e}"),
            Error::StoreError(msg) => write!(f, "Storage error: {msg}"),
            Error::Custom(msg) => msg.fmt(f),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JsonError(e)
    }
}

impl From<httpclient::Error> for Error {
    fn from(e: httpclient::Error) -> Self {
        Error::HttpClientError(e)
    }
}

impl Error {
    pub fn bad_request(msg: impl fmt::Display) -> Self {
        Error::BadRequest(msg.to_string())
    }

    pub fn request_denied(
        msg: impl fmt::Display,
        request_id: impl Into<String>,
        relay_state: Option<String>,
    ) -> Self {
        Error::RequestDenied {
            msg: msg.to_string(),
            request_id: request_id.into(),
            relay_state,
        }
    }

    pub fn illegal_state(msg: impl fmt::Display) -> Self {
        Error::IllegalState(msg.to_string())
    }

    pub fn custom(msg: impl fmt::Display) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Returns the id of the denied request, if this is a denial.
    pub fn denied_request_id(&self) -> Option<&str> {
        match self {
            Error::RequestDenied { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Returns the level this error should be logged at.
    ///
    /// Problems caused by the browser or by policy are warnings, the
    /// rest are errors.
    pub fn log_level(&self) -> Level {
        match self {
            Error::BadRequest(_) | Error::RequestDenied { .. } => Level::Warn,
            _ => Level::Error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::RequestDenied { .. } => StatusCode::FORBIDDEN,
            Error::UpstreamProtocolError { .. } | Error::IdpExchange(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Error::BadRequest(msg) => {
                ErrorResponse::new("bad-request", msg)
            }
            Error::RequestDenied { msg, request_id, .. } => {
                ErrorResponse::new("request-denied", msg)
                    .with_arg("request_id", request_id)
            }

            // Internal details stay in the log, the browser only learns
            // the class of problem.
            Error::IllegalState(_) => {
                ErrorResponse::new(
                    "illegal-state",
                    "Something went wrong internally",
                )
            }
            Error::UpstreamProtocolError { error, .. } => {
                ErrorResponse::new(
                    "upstream-protocol-error",
                    "The identity provider returned an error",
                ).with_arg("error", error)
            }
            Error::IdpExchange(_) => {
                ErrorResponse::new(
                    "idp-exchange-failed",
                    "Could not complete authentication with the identity \
                     provider",
                )
            }
            Error::UpstreamTimeout(what) => {
                ErrorResponse::new("upstream-timeout", self)
                    .with_arg("upstream", what)
            }
            Error::IoError(_) => ErrorResponse::new("sys-io", "I/O error"),
            Error::JsonError(_) => {
                ErrorResponse::new("sys-json", "JSON processing error")
            }
            Error::HttpClientError(_) => {
                ErrorResponse::new("sys-http-client", "HTTP client error")
            }
            Error::StoreError(_) => {
                ErrorResponse::new("sys-store", "Storage error")
            }
            Error::Custom(_) => {
                ErrorResponse::new(
                    "general-error",
                    "Something went wrong internally",
                )
            }
        }
    }
}


//============ Tests =========================================================
