//! The state kept between the hops of an authentication.

use std::fmt;
use crate::light::{LightRequest, LightResponse};


//------------ CorrelationEntry ----------------------------------------------

/// An authentication waiting for the IdP callback.
///
/// Stored under its `state` when the browser is sent to the IdP and taken
/// out again exactly once when it comes back.
#[derive(Clone)]
pub struct CorrelationEntry {
    /// The state sent to the IdP and set in the CSRF cookie.
    pub state: String,

    /// The validated request from the node.
    pub original_request: LightRequest,

    /// The PKCE secret for redeeming the authorization code.
    pub pkce_verifier: String,

    /// The nonce the ID token must carry.
    pub nonce: String,
}

impl fmt::Debug for CorrelationEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CorrelationEntry")
            .field("original_request", &self.original_request.id)
            .finish_non_exhaustive()
    }
}


//------------ PendingConsentEntry -------------------------------------------

/// An identity waiting for the citizen to consent to its release.
#[derive(Clone, Debug)]
pub struct PendingConsentEntry {
    /// The identifier of the consent token, independent of the state.
    pub token_id: String,

    /// The filtered identity awaiting confirmation.
    pub identity_response: LightResponse,
}
