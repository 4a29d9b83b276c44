//! Turning identity claims into a light response.

use std::fmt;
use std::str::FromStr;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::constants::EIDAS_LOA_PREFIX;
use crate::light::{
    LightRequest, LightResponse, NameIdFormat, ResponseAttribute, Status,
    new_light_id,
};
use crate::light::registry::AttributeRegistry;


//------------ LevelOfAssurance ----------------------------------------------

/// The eIDAS levels of assurance, ordered from weakest to strongest.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LevelOfAssurance {
    Low,
    Substantial,
    High,
}

impl LevelOfAssurance {
    /// Returns the value used in the OIDC `acr` claim.
    pub fn as_acr(self) -> &'static str {
        match self {
            LevelOfAssurance::Low => "low",
            LevelOfAssurance::Substantial => "substantial",
            LevelOfAssurance::High => "high",
        }
    }

    /// Parses an eIDAS level of assurance URI.
    pub fn from_eidas_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(EIDAS_LOA_PREFIX).and_then(|acr| acr.parse().ok())
    }

    pub fn eidas_uri(self) -> String {
        format!("{EIDAS_LOA_PREFIX}{}", self.as_acr())
    }
}

impl FromStr for LevelOfAssurance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(LevelOfAssurance::Low),
            "substantial" => Ok(LevelOfAssurance::Substantial),
            "high" => Ok(LevelOfAssurance::High),
            _ => Err(Error::IdpExchange(format!(
                "unknown level of assurance '{s}'"
            ))),
        }
    }
}

impl fmt::Display for LevelOfAssurance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_acr())
    }
}


//------------ IdentityClaims ------------------------------------------------

/// The claims about the citizen taken from a verified ID token.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentityClaims {
    /// The subject: a two letter country code followed by the identifier.
    pub subject: String,

    /// The authentication context class, i.e., the level of assurance.
    pub acr: Option<String>,

    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub date_of_birth: Option<String>,
}

impl IdentityClaims {
    /// Converts the claims into a successful light response.
    ///
    /// Fails if the subject is malformed or from a different country than
    /// requested, or if the level of assurance is missing or lower than
    /// requested.
    pub fn into_light_response(
        self,
        request: &LightRequest,
        issuer: &str,
        registry: &AttributeRegistry,
    ) -> ProxyResult<LightResponse> {
        let level = self.level_of_assurance(request)?;
        let person_identifier = self.person_identifier(request)?;

        let mut attributes = Vec::new();
        let mut push = |friendly_name: &str, value: Option<String>| {
            if let (Some(def), Some(value)) = (
                registry.by_friendly_name(friendly_name), value
            ) {
                attributes.push(ResponseAttribute::new(def.clone(), value));
            }
        };
        push("PersonIdentifier", Some(person_identifier.clone()));
        push("FamilyName", self.family_name);
        push("FirstName", self.given_name);
        push("DateOfBirth", self.date_of_birth);

        Ok(LightResponse {
            id: new_light_id(),
            in_response_to_id: request.id.clone(),
            issuer: issuer.to_string(),
            status: Status::success(),
            relay_state: request.relay_state.clone(),
            subject: Some(person_identifier),
            subject_name_id_format: Some(
                request.name_id_format.clone().unwrap_or_else(|| {
                    NameIdFormat::Unspecified.as_uri().to_string()
                })
            ),
            level_of_assurance: Some(level.eidas_uri()),
            attributes,
        })
    }

    fn level_of_assurance(
        &self, request: &LightRequest
    ) -> ProxyResult<LevelOfAssurance> {
        let acr = self.acr.as_deref().ok_or_else(|| {
            Error::IdpExchange("ID token lacks the acr claim".into())
        })?;
        let level = LevelOfAssurance::from_str(acr)?;
        if let Some(requested) = LevelOfAssurance::from_eidas_uri(
            &request.level_of_assurance
        ) {
            if level < requested {
                return Err(Error::IdpExchange(format!(
                    "level of assurance '{level}' is lower than the \
                     requested '{requested}'"
                )))
            }
        }
        Ok(level)
    }

    /// Builds the eIDAS unique identifier `CC/SP/identifier`.
    fn person_identifier(&self, request: &LightRequest) -> ProxyResult<String> {
        let (country, id) = match (
            self.subject.get(..2), self.subject.get(2..)
        ) {
            (Some(country), Some(id))
                if country.bytes().all(|b| b.is_ascii_uppercase())
                    && !id.is_empty() => (country, id),
            _ => {
                return Err(Error::IdpExchange(format!(
                    "subject '{}' is not prefixed with a country code",
                    self.subject
                )))
            }
        };
        if country != request.citizen_country_code {
            return Err(Error::IdpExchange(format!(
                "subject country '{country}' does not match the requested \
                 citizen country '{}'",
                request.citizen_country_code
            )))
        }
        let sp_country = request.sp_country_code.as_deref().unwrap_or(country);
        Ok(format!("{country}/{sp_country}/{id}"))
    }
}


//============ Tests =========================================================
