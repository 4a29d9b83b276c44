//! Common types and helpers used throughout the proxy.

pub mod error;
pub mod httpclient;
pub mod store;

//------------ Response Aliases ----------------------------------------------

pub type ProxyResult<T> = std::result::Result<T, error::Error>;
