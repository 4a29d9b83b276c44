//! Outgoing HTTP.
use std::{error, fmt, time::Duration};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::constants::PROXY_USER_AGENT;

/// Creates a client with a request timeout.
///
/// Unless `follow_redirects` is set, redirects are returned to the caller
/// as they are. Connections to `https://localhost` accept any certificate
/// so that a locally running IdP can be used during development.
pub fn client_with_tweaks(
    uri: &str,
    timeout: Duration,
    follow_redirects: bool,
) -> Result<reqwest::Client, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(PROXY_USER_AGENT));

    let builder = reqwest::ClientBuilder::new()
        .timeout(timeout)
        .default_headers(headers)
        .redirect(if follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        })
        .danger_accept_invalid_certs(is_local(uri));

    builder.build().map_err(|e| Error::request_build(uri, e))
}

fn is_local(uri: &str) -> bool {
    ["https://localhost", "https://127.0.0.1", "https://[::1]"]
        .iter()
        .any(|prefix| uri.starts_with(prefix))
}

//------------ Error --------------------------------------------------------

/// Something went wrong talking to a remote server.
#[derive(Debug)]
pub enum Error {
    /// The request could not be put together.
    RequestBuild { uri: String, msg: String },

    /// The request did not get a response.
    RequestExecute { uri: String, msg: String },

    /// The response could not be understood.
    Response { uri: String, msg: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::RequestBuild { uri, msg } => {
                write!(f, "cannot create request for {}: {}", uri, msg)
            }
            Error::RequestExecute { uri, msg } => {
                write!(f, "cannot reach {}: {}", uri, msg)
            }
            Error::Response { uri, msg } => {
                write!(f, "bad response from {}: {}", uri, msg)
            }
        }
    }
}

impl error::Error for Error {}

impl Error {
    pub fn request_build(uri: &str, msg: impl fmt::Display) -> Self {
        Error::RequestBuild { uri: uri.into(), msg: msg.to_string() }
    }

    pub fn execute(uri: &str, msg: impl fmt::Display) -> Self {
        Error::RequestExecute { uri: uri.into(), msg: msg.to_string() }
    }

    pub fn response(uri: &str, msg: impl fmt::Display) -> Self {
        Error::Response { uri: uri.into(), msg: msg.to_string() }
    }
}

//------------ Tests ---------------------------------------------------------
