//! Receiving a light request and sending the citizen to the IdP.

use std::str::FromStr;
use log::{debug, info};
use url::Url;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::light::{LightRequest, NameIdFormat};
use crate::light::country::is_iso_alpha2;
use super::ProxyService;
use super::correlation::CorrelationEntry;


//------------ Constants -----------------------------------------------------

/// Friendly names of attributes describing a legal person.
const LEGAL_PERSON_ATTRIBUTES: &[&str] = &[
    "LegalName", "LegalPersonIdentifier",
];

/// Friendly names of attributes describing a natural person.
const NATURAL_PERSON_ATTRIBUTES: &[&str] = &[
    "GivenName", "FirstName", "FamilyName", "PersonIdentifier", "DateOfBirth",
];


//------------ IdpRedirect ---------------------------------------------------

/// Where to send the browser after accepting a light request.
#[derive(Clone, Debug)]
pub struct IdpRedirect {
    /// The IdP authentication URL.
    pub location: Url,

    /// The value of the `Set-Cookie` header binding the state.
    pub set_cookie: String,
}


//------------ ProxyService: request flow ------------------------------------

impl ProxyService {
    /// Processes the token of a light request sent by the node.
    ///
    /// The light request is consumed by this call even if it later turns
    /// out to be invalid.
    pub async fn handle_proxy_request(
        &self, token: &str
    ) -> ProxyResult<IdpRedirect> {
        let request = self.bounded(
            "node communication", self.node.get_and_remove_request(token)
        ).await?.ok_or_else(|| Error::bad_request("Invalid token"))?;

        debug!("Received light request {}", request.id);
        self.validate_request(&request)?;

        let state = self.binder.new_state();
        let auth_request = self.idp.authentication_request(&request, &state)?;

        info!(
            "Sending citizen to the IdP for request {} from {}",
            request.id, request.issuer
        );

        let location = auth_request.url;
        self.correlations.put(
            state.clone(),
            CorrelationEntry {
                state: state.clone(),
                original_request: request,
                pkce_verifier: auth_request.pkce_verifier,
                nonce: auth_request.nonce,
            },
            self.settings.correlation_ttl,
        ).await?;

        Ok(IdpRedirect {
            location,
            set_cookie: self.binder.set_cookie(&state),
        })
    }

    /// Checks that a light request can be served.
    pub fn validate_request(&self, request: &LightRequest) -> ProxyResult<()> {
        let supported = request.sp_type.as_ref().is_some_and(|sp_type| {
            self.settings.supported_sp_types.contains(sp_type)
        });
        if !supported {
            return Err(Error::request_denied(
                format!(
                    "Service provider type not supported. Allowed types: {}",
                    self.settings.supported_sp_types.join(", ")
                ),
                request.id.clone(),
                request.relay_state.clone(),
            ))
        }

        if !is_iso_alpha2(&request.citizen_country_code) {
            return Err(Error::bad_request(
                "CitizenCountryCode not in 3166-1-alpha-2 format"
            ))
        }

        if let Some(format) = &request.name_id_format {
            if NameIdFormat::from_str(format).is_err() {
                return Err(Error::bad_request("Invalid NameIdFormat"))
            }
        }

        let requests_any = |names: &[&str]| {
            request.requested_attributes.iter().any(|attr| {
                names.contains(&attr.friendly_name.as_str())
            })
        };
        if requests_any(LEGAL_PERSON_ATTRIBUTES)
            && requests_any(NATURAL_PERSON_ATTRIBUTES)
        {
            return Err(Error::bad_request(
                "Request may not contain both legal person and natural \
                 person attributes"
            ))
        }

        Ok(())
    }
}
