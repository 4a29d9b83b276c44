//! HTTP responses.

use bytes::Bytes;
use http_body_util::{Either, Empty, Full};
use hyper::{HeaderMap, StatusCode};
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, SET_COOKIE};
use log::error;
use serde::Serialize;
use crate::commons::error::Error;


//----------- ContentType ----------------------------------------------------

#[derive(Clone, Copy)]
enum ContentType {
    Json,
    Html,
    Text,
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Html => "text/html;charset=utf-8",
            ContentType::Text => "text/plain",
        }
    }
}


//------------ HyperResponse -------------------------------------------------

pub type HyperResponseBody = Either<Empty<Bytes>, Full<Bytes>>;
pub type HyperResponse = hyper::Response<HyperResponseBody>;


//----------- Response -------------------------------------------------------

struct Response {
    status: StatusCode,
    content_type: ContentType,
    location: Option<String>,
    set_cookie: Option<String>,
    body: Bytes,
    cause: Option<Error>,
}

impl Response {
    fn new(status: StatusCode) -> Self {
        Response {
            status,
            content_type: ContentType::Text,
            location: None,
            set_cookie: None,
            body: Bytes::default(),
            cause: None,
        }
    }

    fn finalize(self) -> HttpResponse {
        let mut builder = hyper::Response::builder()
            .status(self.status)
            .header(CONTENT_TYPE, self.content_type.as_str())
            .header(CACHE_CONTROL, "no-store");

        if let Some(location) = self.location {
            builder = builder.header(LOCATION, location);
        }
        if let Some(cookie) = self.set_cookie {
            builder = builder.header(SET_COOKIE, cookie);
        }

        let body = if self.body.is_empty() {
            Either::Left(Empty::new())
        } else {
            Either::Right(Full::new(self.body))
        };

        // Header values come from configuration and may be unusable. Fall
        // back to a bare 500 rather than taking the server down.
        let response = builder.body(body).unwrap_or_else(|err| {
            error!("Cannot build HTTP response: {err}");
            let mut response = hyper::Response::new(
                Either::Left(Empty::new())
            );
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        });

        let mut r = HttpResponse::new(response);
        if let Some(cause) = self.cause {
            r.set_cause(cause);
        }
        r
    }
}


//------------ HttpResponse --------------------------------------------------

#[derive(Debug)]
pub struct HttpResponse {
    response: HyperResponse,
    cause: Option<Error>,
}

impl HttpResponse {
    pub fn new(response: HyperResponse) -> Self {
        HttpResponse { response, cause: None }
    }

    pub fn into_hyper(self) -> HyperResponse {
        self.response
    }

    /// Returns the error that caused this response, if any.
    ///
    /// This is used for logging where the response body is not helpful.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_ref()
    }

    pub fn set_cause(&mut self, error: Error) {
        self.cause = Some(error);
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn body(&self) -> &HyperResponseBody {
        self.response.body()
    }

    pub fn json<O: Serialize>(object: &O) -> Self {
        match serde_json::to_string(object) {
            Ok(json) => {
                let mut res = Response::new(StatusCode::OK);
                res.content_type = ContentType::Json;
                res.body = json.into();
                res.finalize()
            }
            Err(e) => Self::response_from_error(Error::JsonError(e)),
        }
    }

    pub fn html(body: String) -> Self {
        let mut res = Response::new(StatusCode::OK);
        res.content_type = ContentType::Html;
        res.body = body.into();
        res.finalize()
    }

    pub fn response_from_error(error: Error) -> Self {
        let status = error.status();
        let body = match serde_json::to_string(&error.to_error_response()) {
            Ok(body) => body.into(),
            Err(_) => Bytes::new(),
        };
        let mut res = Response::new(status);
        res.content_type = ContentType::Json;
        res.body = body;
        res.cause = Some(error);
        res.finalize()
    }

    /// A redirect which keeps the error that led to it for logging.
    pub fn found_after_error(location: &str, error: Error) -> Self {
        let mut res = Response::new(StatusCode::FOUND);
        res.location = Some(location.into());
        res.cause = Some(error);
        res.finalize()
    }

    pub fn found(location: &str) -> Self {
        let mut res = Response::new(StatusCode::FOUND);
        res.location = Some(location.into());
        res.finalize()
    }

    pub fn found_with_cookie(location: &str, cookie: String) -> Self {
        let mut res = Response::new(StatusCode::FOUND);
        res.location = Some(location.into());
        res.set_cookie = Some(cookie);
        res.finalize()
    }

    pub fn not_found() -> Self {
        Response::new(StatusCode::NOT_FOUND).finalize()
    }

    pub fn method_not_allowed() -> Self {
        Response::new(StatusCode::METHOD_NOT_ALLOWED).finalize()
    }
}


//============ Tests =========================================================
