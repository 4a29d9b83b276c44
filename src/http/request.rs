//! HTTP requests.

use std::borrow::Cow;
use bytes::Bytes;
use hyper::Method;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::http::request::Parts;
use log::trace;
use percent_encoding::percent_decode;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::constants::MAX_PARAMETER_LENGTH;
use super::response::HttpResponse;
use super::server::HttpServer;


//------------ Request -------------------------------------------------------

/// A request with its body already read.
pub struct Request<'a> {
    /// The head of the raw request.
    parts: Parts,

    /// The body of the request.
    body: Bytes,

    /// The server providing access to the proxy.
    server: &'a HttpServer,
}

impl<'a> Request<'a> {
    pub fn new(parts: Parts, body: Bytes, server: &'a HttpServer) -> Self {
        Request { parts, body, server }
    }

    pub fn server(&self) -> &'a HttpServer {
        self.server
    }

    /// Checks whether the request is a GET or returns an error response.
    pub fn check_get(&self) -> Result<(), HttpResponse> {
        match self.parts.method {
            Method::GET => Ok(()),
            _ => Err(HttpResponse::method_not_allowed()),
        }
    }

    /// Checks whether the request is a GET or POST.
    pub fn check_get_or_post(&self) -> Result<(), HttpResponse> {
        match self.parts.method {
            Method::GET | Method::POST => Ok(()),
            _ => Err(HttpResponse::method_not_allowed()),
        }
    }

    /// Returns the decoded request path.
    pub fn path(&self) -> ProxyResult<Cow<'_, str>> {
        percent_decode(
            self.parts.uri.path().as_bytes()
        ).decode_utf8().map_err(|_| Error::bad_request("Invalid request path"))
    }

    /// Returns the request parameters.
    ///
    /// These are the query parameters and, for a POST with a form body,
    /// the form parameters.
    pub fn params(&self) -> Params {
        let mut params = Params::default();
        if let Some(query) = self.parts.uri.query() {
            params.extend_from(query.as_bytes());
        }
        if self.parts.method == Method::POST && self.is_form() {
            params.extend_from(&self.body);
        }
        params
    }

    fn is_form(&self) -> bool {
        self.parts.headers.get(CONTENT_TYPE).and_then(|value| {
            value.to_str().ok()
        }).is_some_and(|value| {
            value.starts_with("application/x-www-form-urlencoded")
        })
    }

    /// Returns the value of the cookie with the given name.
    ///
    /// Each cookie pair is parsed on its own, so a malformed cookie set by
    /// some other site component does not hide the ones we are after.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.parts.headers.get_all(COOKIE).iter().filter_map(|header| {
            header.to_str().ok()
        }).flat_map(|header| {
            header.split(';')
        }).find_map(|pair| {
            let pair = pair.trim();
            match basic_cookies::Cookie::parse(pair) {
                Ok(cookies) => cookies.iter().find(|cookie| {
                    cookie.get_name() == name
                }).map(|cookie| cookie.get_value().to_string()),
                Err(err) => {
                    trace!("Skipping unparseable cookie '{pair}': {err:?}");
                    None
                }
            }
        })
    }
}


//------------ Params --------------------------------------------------------

/// Request parameters from the query and form body.
#[derive(Clone, Debug, Default)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    fn extend_from(&mut self, input: &[u8]) {
        self.pairs.extend(
            url::form_urlencoded::parse(input).map(|(key, value)| {
                (key.into_owned(), value.into_owned())
            })
        )
    }

    /// Returns the single value of a parameter if present.
    ///
    /// Repeated parameters are rejected rather than merged, and values must
    /// have between one and the maximum parameter length characters.
    pub fn single(&self, name: &str) -> ProxyResult<Option<&str>> {
        let mut values = self.pairs.iter().filter(|(key, _)| key == name);
        let Some((_, value)) = values.next() else {
            return Ok(None)
        };
        if values.next().is_some() {
            return Err(Error::bad_request(format!(
                "Multiple instances of parameter '{name}' are not allowed"
            )))
        }
        let len = value.chars().count();
        if len == 0 || len > MAX_PARAMETER_LENGTH {
            return Err(Error::bad_request(format!(
                "Parameter '{name}' must have between 1 and \
                 {MAX_PARAMETER_LENGTH} characters"
            )))
        }
        Ok(Some(value))
    }

    /// Returns the single value of a required parameter.
    pub fn required(&self, name: &str) -> ProxyResult<&str> {
        self.single(name)?.ok_or_else(|| {
            Error::bad_request(format!(
                "Required request parameter '{name}' is not present"
            ))
        })
    }
}


//============ Tests =========================================================
