//! The HTTP front end of the proxy.
//!
//! The front end only deals with HTTP: it picks the parameters and the
//! CSRF cookie out of requests, hands them to the [`ProxyService`] and
//! turns the outcome into redirects, pages or error responses.
//!
//! [`ProxyService`]: crate::proxy::ProxyService

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;
pub mod start;
