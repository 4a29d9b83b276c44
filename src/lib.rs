//! The eIDAS specific proxy service library crate.
//!
//! The proxy sits between an eIDAS node and an OpenID Connect identity
//! provider. It accepts light requests from the node, has the citizen
//! authenticate at the IdP and answers the node with a light response.

pub mod commons;
pub mod config;
pub mod constants;
pub mod http;
pub mod idp;
pub mod light;
pub mod proxy;
