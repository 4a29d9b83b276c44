//! The eIDAS light request and light response.
//!
//! These are the storage-referenced representations of SAML
//! authentication requests and assertions exchanged with the eIDAS node.
//! The node stores a [`LightRequest`] and hands the proxy an opaque token
//! for it; the proxy answers by storing a [`LightResponse`] and handing a
//! token back.

use std::{fmt, str};
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};
use crate::constants::{
    SAML_STATUS_REQUESTER, SAML_STATUS_SUCCESS,
    SAML_SUB_STATUS_REQUEST_DENIED,
};

pub mod country;
pub mod node;
pub mod registry;
pub mod token;


//------------ PersonType ----------------------------------------------------

/// Whom an attribute describes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    NaturalPerson,
    LegalPerson,
}


//------------ AttributeDefinition -------------------------------------------

/// The definition of an eIDAS attribute.
///
/// Definitions are identified by their name URI alone: two definitions
/// with the same URI are equal regardless of their other fields.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AttributeDefinition {
    pub name_uri: String,
    pub friendly_name: String,
    pub person_type: PersonType,
}

impl AttributeDefinition {
    pub fn new(
        name_uri: impl Into<String>,
        friendly_name: impl Into<String>,
        person_type: PersonType,
    ) -> Self {
        AttributeDefinition {
            name_uri: name_uri.into(),
            friendly_name: friendly_name.into(),
            person_type,
        }
    }
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name_uri == other.name_uri
    }
}

impl Eq for AttributeDefinition {}

impl Hash for AttributeDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name_uri.hash(state)
    }
}

impl fmt::Display for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.friendly_name, self.name_uri)
    }
}


//------------ NameIdFormat --------------------------------------------------

/// The SAML name identifier formats the proxy understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameIdFormat {
    Unspecified,
    Persistent,
    Transient,
}

impl NameIdFormat {
    pub fn as_uri(&self) -> &'static str {
        match self {
            NameIdFormat::Unspecified => {
                "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified"
            }
            NameIdFormat::Persistent => {
                "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"
            }
            NameIdFormat::Transient => {
                "urn:oasis:names:tc:SAML:2.0:nameid-format:transient"
            }
        }
    }
}

impl str::FromStr for NameIdFormat {
    type Err = UnknownNameIdFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            NameIdFormat::Unspecified,
            NameIdFormat::Persistent,
            NameIdFormat::Transient,
        ].into_iter().find(|format| format.as_uri() == s).ok_or(
            UnknownNameIdFormat
        )
    }
}

impl fmt::Display for NameIdFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_uri())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownNameIdFormat;

impl fmt::Display for UnknownNameIdFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown SAML name ID format")
    }
}


//------------ LightRequest --------------------------------------------------

/// An authentication request received from the eIDAS node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LightRequest {
    /// The unique identifier of the request.
    pub id: String,

    /// The node that issued the request.
    pub issuer: String,

    /// The country of the citizen to authenticate.
    pub citizen_country_code: String,

    /// The country of the requesting service provider.
    #[serde(default)]
    pub sp_country_code: Option<String>,

    /// The type of the requesting service provider, e.g., `public`.
    #[serde(default)]
    pub sp_type: Option<String>,

    /// The requested name ID format as a URI.
    #[serde(default)]
    pub name_id_format: Option<String>,

    /// The requested level of assurance.
    pub level_of_assurance: String,

    /// The human readable name of the requesting service provider.
    #[serde(default)]
    pub provider_name: Option<String>,

    /// Opaque state to hand back to the node unchanged.
    #[serde(default)]
    pub relay_state: Option<String>,

    /// The attributes the service provider asks for.
    #[serde(default)]
    pub requested_attributes: Vec<AttributeDefinition>,
}


//------------ Status --------------------------------------------------------

/// The SAML status of a light response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Status {
    pub failure: bool,
    pub status_code: String,
    #[serde(default)]
    pub sub_status_code: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl Status {
    pub fn success() -> Self {
        Status {
            failure: false,
            status_code: SAML_STATUS_SUCCESS.into(),
            sub_status_code: None,
            status_message: None,
        }
    }

    pub fn request_denied(message: impl Into<String>) -> Self {
        Status {
            failure: true,
            status_code: SAML_STATUS_REQUESTER.into(),
            sub_status_code: Some(SAML_SUB_STATUS_REQUEST_DENIED.into()),
            status_message: Some(message.into()),
        }
    }
}


//------------ ResponseAttribute ---------------------------------------------

/// An attribute of the authenticated subject with its values.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResponseAttribute {
    pub definition: AttributeDefinition,
    pub values: Vec<String>,
}

impl ResponseAttribute {
    pub fn new(definition: AttributeDefinition, value: impl Into<String>) -> Self {
        ResponseAttribute { definition, values: vec![value.into()] }
    }
}


//------------ LightResponse -------------------------------------------------

/// The outcome of an authentication, handed back to the eIDAS node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LightResponse {
    /// The unique identifier of this response.
    pub id: String,

    /// The identifier of the request this response answers.
    pub in_response_to_id: String,

    /// The proxy service issuing the response.
    pub issuer: String,

    pub status: Status,

    #[serde(default)]
    pub relay_state: Option<String>,

    /// The subject identifier, present on success.
    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub subject_name_id_format: Option<String>,

    #[serde(default)]
    pub level_of_assurance: Option<String>,

    #[serde(default)]
    pub attributes: Vec<ResponseAttribute>,
}

impl LightResponse {
    /// Creates a failure response denying the given request.
    pub fn denied(
        in_response_to_id: impl Into<String>,
        issuer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LightResponse {
            id: new_light_id(),
            in_response_to_id: in_response_to_id.into(),
            issuer: issuer.into(),
            status: Status::request_denied(message),
            relay_state: None,
            subject: None,
            subject_name_id_format: None,
            level_of_assurance: None,
            attributes: Vec::new(),
        }
    }

    /// Returns the attribute with the given friendly name, if present.
    pub fn attribute(&self, friendly_name: &str) -> Option<&ResponseAttribute> {
        self.attributes.iter().find(|attr| {
            attr.definition.friendly_name == friendly_name
        })
    }
}


//------------ Helpers -------------------------------------------------------

/// Creates a new identifier for a light request, response or token.
///
/// SAML identifiers must not start with a digit, hence the underscore.
pub fn new_light_id() -> String {
    format!("_{}", uuid::Uuid::new_v4())
}


//============ Tests =========================================================
