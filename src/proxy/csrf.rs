//! Binding the OIDC state to the browser.
//!
//! The state sent to the IdP is also the key of the correlation entry and
//! the value of a cookie set on the citizen's browser. When the browser
//! comes back from the IdP, the state in the query must match the cookie,
//! which proves that the callback was started by this browser.

use std::fmt;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::Engine as _;
use rand::Rng;
use serde::{de, Deserialize, Deserializer};
use crate::constants::{CSRF_COOKIE_NAME, STATE_RANDOM_BYTES};
use crate::light::token::constant_time_eq;


//------------ StateCookieConfig ---------------------------------------------

/// The attributes of the state cookie.
///
/// Every attribute is optional. Attributes that are not set are left off
/// the cookie entirely rather than being given a default.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct StateCookieConfig {
    #[serde(default)]
    pub http_only: Option<bool>,

    #[serde(default)]
    pub secure: Option<bool>,

    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub same_site: Option<SameSite>,

    /// Lifetime of the cookie in seconds. Zero counts as not set.
    #[serde(default)]
    pub max_age: Option<u64>,
}


//------------ SameSite ------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SameSite {
    fn deserialize<D>(d: D) -> Result<SameSite, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(de::Error::custom(format!(
                "expected \"Strict\", \"Lax\" or \"None\", found: \"{}\"",
                string
            ))),
        }
    }
}


//------------ CsrfStateBinder -----------------------------------------------

/// Creates state values and checks them against the cookie.
#[derive(Clone, Debug)]
pub struct CsrfStateBinder {
    cookie: StateCookieConfig,
}

impl CsrfStateBinder {
    pub fn new(cookie: StateCookieConfig) -> Self {
        CsrfStateBinder { cookie }
    }

    /// Creates a new, unguessable state value.
    ///
    /// The value is URL safe, so it can be used as is in a query
    /// parameter, as a cookie value, and as a store key.
    pub fn new_state(&self) -> String {
        let mut bytes = [0u8; STATE_RANDOM_BYTES];
        rand::rng().fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Checks that the state from the query matches the cookie value.
    ///
    /// Both values need to be present and identical.
    pub fn verify(state: Option<&str>, cookie: Option<&str>) -> bool {
        match (state, cookie) {
            (Some(state), Some(cookie)) if !state.is_empty() => {
                constant_time_eq(state.as_bytes(), cookie.as_bytes())
            }
            _ => false,
        }
    }

    /// Returns the value of a `Set-Cookie` header for the state.
    pub fn set_cookie(&self, state: &str) -> String {
        let mut res = format!("{CSRF_COOKIE_NAME}={state}");
        if let Some(max_age) = self.cookie.max_age.filter(|age| *age != 0) {
            res.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.cookie.domain {
            res.push_str(&format!("; Domain={domain}"));
        }
        if let Some(path) = &self.cookie.path {
            res.push_str(&format!("; Path={path}"));
        }
        if self.cookie.secure == Some(true) {
            res.push_str("; Secure");
        }
        if self.cookie.http_only == Some(true) {
            res.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.cookie.same_site {
            res.push_str(&format!("; SameSite={same_site}"));
        }
        res
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn states_are_random_and_url_safe() {
        let binder = CsrfStateBinder::new(StateCookieConfig::default());
        let states: HashSet<String> = (0..100).map(|_| {
            binder.new_state()
        }).collect();
        assert_eq!(states.len(), 100);

        for state in &states {
            // 256 bits in unpadded base64
            assert_eq!(state.len(), 43);
            assert!(state.chars().all(|c| {
                c.is_ascii_alphanumeric() || c == '-' || c == '_'
            }));
        }
    }

    #[test]
    fn verify_requires_exact_match() {
        let state = "b5oTOl0mOcAV5nGEjbPhbZRb3wgKzsZWjzsfhO9cDv4";
        assert!(CsrfStateBinder::verify(Some(state), Some(state)));

        let off_by_one = "b5oTOl0mOcAV5nGEjbPhbZRb3wgKzsZWjzsfhO9cDv5";
        assert!(!CsrfStateBinder::verify(Some(state), Some(off_by_one)));
        assert!(!CsrfStateBinder::verify(Some(state), Some(&state[1..])));
        assert!(!CsrfStateBinder::verify(Some(state), None));
        assert!(!CsrfStateBinder::verify(None, Some(state)));
        assert!(!CsrfStateBinder::verify(Some(""), Some("")));
    }

    #[test]
    fn unset_cookie_attributes_are_omitted() {
        let binder = CsrfStateBinder::new(StateCookieConfig::default());
        assert_eq!(
            binder.set_cookie("abc"),
            "eidas_service_proxy_oidc_csrf=abc"
        );

        let binder = CsrfStateBinder::new(StateCookieConfig {
            http_only: Some(false),
            secure: Some(false),
            max_age: Some(0),
            ..Default::default()
        });
        assert_eq!(
            binder.set_cookie("abc"),
            "eidas_service_proxy_oidc_csrf=abc"
        );
    }

    #[test]
    fn set_cookie_attributes_are_rendered() {
        let binder = CsrfStateBinder::new(StateCookieConfig {
            http_only: Some(true),
            secure: Some(true),
            domain: Some("proxy.example.com".into()),
            path: Some("/IdpResponse".into()),
            same_site: Some(SameSite::Lax),
            max_age: Some(300),
        });
        assert_eq!(
            binder.set_cookie("abc"),
            "eidas_service_proxy_oidc_csrf=abc; Max-Age=300; \
             Domain=proxy.example.com; Path=/IdpResponse; Secure; HttpOnly; \
             SameSite=Lax"
        );
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        let config: StateCookieConfig = toml::from_str(
            "same_site = \"strict\""
        ).unwrap();
        assert_eq!(config.same_site, Some(SameSite::Strict));
        assert!(toml::from_str::<StateCookieConfig>(
            "same_site = \"sometimes\""
        ).is_err());
    }
}
