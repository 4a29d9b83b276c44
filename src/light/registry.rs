//! The registry of known eIDAS attributes.

use std::collections::HashMap;
use log::debug;
use super::{AttributeDefinition, PersonType, ResponseAttribute};


//------------ Attribute URIs ------------------------------------------------

const NATURAL_PERSON_PREFIX: &str =
    "http://eidas.europa.eu/attributes/naturalperson/";

const LEGAL_PERSON_PREFIX: &str =
    "http://eidas.europa.eu/attributes/legalperson/";

/// The eIDAS minimum data set and optional attributes for natural persons
/// as (local name, friendly name).
const NATURAL_PERSON_ATTRIBUTES: &[(&str, &str)] = &[
    ("PersonIdentifier", "PersonIdentifier"),
    ("CurrentFamilyName", "FamilyName"),
    ("CurrentGivenName", "FirstName"),
    ("DateOfBirth", "DateOfBirth"),
    ("BirthName", "BirthName"),
    ("PlaceOfBirth", "PlaceOfBirth"),
    ("CurrentAddress", "CurrentAddress"),
    ("Gender", "Gender"),
];

/// The eIDAS minimum data set and optional attributes for legal persons.
const LEGAL_PERSON_ATTRIBUTES: &[(&str, &str)] = &[
    ("LegalPersonIdentifier", "LegalPersonIdentifier"),
    ("LegalName", "LegalName"),
    ("LegalPersonAddress", "LegalAddress"),
    ("VATRegistrationNumber", "VATRegistration"),
    ("TaxReference", "TaxReference"),
    ("D-2012-17-EUIdentifier", "D-2012-17-EUIdentifier"),
    ("LEI", "LEI"),
    ("EORI", "EORI"),
    ("SEED", "SEED"),
    ("SIC", "SIC"),
];


//------------ AttributeRegistry ---------------------------------------------

/// An immutable set of attribute definitions.
///
/// The registry is built once at startup and only ever read afterwards,
/// so it can be shared freely between requests.
#[derive(Clone, Debug)]
pub struct AttributeRegistry {
    by_uri: HashMap<String, AttributeDefinition>,
}

impl AttributeRegistry {
    /// Creates a registry from the given definitions.
    pub fn new(definitions: impl IntoIterator<Item = AttributeDefinition>) -> Self {
        AttributeRegistry {
            by_uri: definitions.into_iter().map(|def| {
                (def.name_uri.clone(), def)
            }).collect()
        }
    }

    /// Creates a registry with the eIDAS core attributes.
    pub fn eidas_core() -> Self {
        let natural = NATURAL_PERSON_ATTRIBUTES.iter().map(|(local, friendly)| {
            AttributeDefinition::new(
                format!("{NATURAL_PERSON_PREFIX}{local}"),
                *friendly,
                PersonType::NaturalPerson,
            )
        });
        let legal = LEGAL_PERSON_ATTRIBUTES.iter().map(|(local, friendly)| {
            AttributeDefinition::new(
                format!("{LEGAL_PERSON_PREFIX}{local}"),
                *friendly,
                PersonType::LegalPerson,
            )
        });
        Self::new(natural.chain(legal))
    }

    /// Returns whether the definition is known to the registry.
    pub fn is_registered(&self, definition: &AttributeDefinition) -> bool {
        self.by_uri.contains_key(&definition.name_uri)
    }

    /// Returns the definition with the given friendly name.
    pub fn by_friendly_name(&self, name: &str) -> Option<&AttributeDefinition> {
        self.by_uri.values().find(|def| def.friendly_name == name)
    }

    /// Drops all attributes not known to the registry.
    pub fn filter(
        &self, attributes: Vec<ResponseAttribute>
    ) -> Vec<ResponseAttribute> {
        attributes.into_iter().filter(|attr| {
            let known = self.is_registered(&attr.definition);
            if !known {
                debug!(
                    "Dropping unregistered attribute {}", attr.definition
                );
            }
            known
        }).collect()
    }

    pub fn len(&self) -> usize {
        self.by_uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::eidas_core()
    }
}


//============ Tests =========================================================
