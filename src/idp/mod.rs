//! Authenticating citizens with an external identity provider.

use std::fmt;
use async_trait::async_trait;
use url::Url;
use crate::commons::ProxyResult;
use crate::light::{LightRequest, LightResponse};

pub mod claims;
pub mod httpclient;
pub mod oidc;


//------------ AuthenticationRequest -----------------------------------------

/// An outbound authentication request to the IdP.
pub struct AuthenticationRequest {
    /// Where to send the browser.
    pub url: Url,

    /// The PKCE secret needed to redeem the authorization code.
    pub pkce_verifier: String,

    /// The nonce the ID token needs to carry.
    pub nonce: String,
}

impl fmt::Debug for AuthenticationRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthenticationRequest")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}


//------------ IdentityProvider ----------------------------------------------

/// An identity provider reachable through the authorization code flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the authentication request for a light request.
    ///
    /// The given `state` must be sent along unchanged so that the callback
    /// can be correlated.
    fn authentication_request(
        &self, request: &LightRequest, state: &str,
    ) -> ProxyResult<AuthenticationRequest>;

    /// Redeems an authorization code for the citizen's identity.
    ///
    /// On success, returns a successful light response answering
    /// `request`. Attributes are not yet filtered.
    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
        nonce: &str,
        request: &LightRequest,
    ) -> ProxyResult<LightResponse>;
}
