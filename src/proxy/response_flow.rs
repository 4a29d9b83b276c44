//! Receiving the IdP callback and answering the node.

use log::{debug, info};
use url::Url;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use super::ProxyService;
use super::consent::ConsentView;
use super::correlation::PendingConsentEntry;
use super::csrf::CsrfStateBinder;


//------------ IdpCallback ---------------------------------------------------

/// The parameters the IdP sends the browser back with.
#[derive(Clone, Debug, Default)]
pub struct IdpCallback {
    pub state: String,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}


//------------ CallbackOutcome -----------------------------------------------

/// What to show the citizen after a successful callback.
#[derive(Clone, Debug)]
pub enum CallbackOutcome {
    /// Ask the citizen to confirm releasing the attributes.
    AwaitingConsent(ConsentView),

    /// The response was handed to the node, redirect there.
    Delivered(Url),
}


//------------ ProxyService: response flow -----------------------------------

impl ProxyService {
    /// Processes the callback from the IdP.
    ///
    /// The correlation entry for the state is consumed by this call even
    /// if the callback later turns out to be invalid, so a state can never
    /// be used twice.
    pub async fn handle_idp_response(
        &self, callback: IdpCallback, csrf_cookie: Option<&str>,
    ) -> ProxyResult<CallbackOutcome> {
        match (&callback.code, &callback.error) {
            (None, None) => {
                return Err(Error::bad_request(
                    "Either error or code parameter is required"
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::bad_request(
                    "Either error or code parameter can be present in a \
                     callback request. Both code and error parameters found"
                ))
            }
            _ => { }
        }

        let entry = self.correlations.get_and_remove(
            &callback.state
        ).await?.ok_or_else(|| Error::bad_request("Invalid state"))?;
        let request = entry.original_request;

        // Nothing reaches the node unless the browser proves it started
        // this authentication, not even a cancellation.
        if !CsrfStateBinder::verify(Some(&callback.state), csrf_cookie) {
            return Err(Error::illegal_state(format!(
                "state parameter does not match csrf cookie for request {}",
                request.id
            )))
        }

        if let Some(error) = callback.error {
            if error == self.settings.error_code_user_cancel {
                return Err(Error::request_denied(
                    "User canceled the authentication process",
                    request.id,
                    request.relay_state,
                ))
            }
            return Err(Error::UpstreamProtocolError {
                error,
                description: callback.error_description,
            })
        }

        // The match above guarantees a code if there is no error.
        let code = callback.code.ok_or_else(|| {
            Error::illegal_state("callback has neither code nor error")
        })?;

        let mut response = self.bounded(
            "identity provider",
            self.idp.exchange(
                &code, &entry.pkce_verifier, &entry.nonce, &request
            ),
        ).await?;
        response.attributes = self.registry.filter(response.attributes);

        info!(
            "Citizen authenticated for request {} with {} attributes",
            request.id, response.attributes.len()
        );

        if self.settings.ask_consent {
            let reference = self.consent_codec.issue();
            let view = ConsentView::new(
                self.consent_codec.encode(&reference),
                &request,
                &response,
            );
            debug!(
                "Awaiting consent for request {} as {}",
                request.id, reference.id
            );
            self.pending_consents.put(
                reference.id.clone(),
                PendingConsentEntry {
                    token_id: reference.id,
                    identity_response: response,
                },
                self.settings.pending_consent_ttl,
            ).await?;
            Ok(CallbackOutcome::AwaitingConsent(view))
        }
        else {
            self.deliver(response).await.map(CallbackOutcome::Delivered)
        }
    }
}
