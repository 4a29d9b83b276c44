//! Opaque tokens referencing stored light requests and responses.
//!
//! A token is the standard base64 encoding of
//! `issuer|id|timestamp|digest` where the digest is the base64 encoded
//! SHA-256 hash of `id|issuer|timestamp|secret`. The secret is shared
//! between the proxy and the node, so only they can mint valid tokens.

use std::fmt;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::engine::Engine as _;
use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use log::trace;
use openssl::sha::sha256;
use regex::Regex;
use crate::constants::MAX_PARAMETER_LENGTH;
use super::new_light_id;


//------------ Constants -----------------------------------------------------

/// The separator between the fields of a token.
const SEPARATOR: char = '|';

/// The format of the timestamp field.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %3f";

lazy_static! {
    static ref TOKEN_SYNTAX: Regex = Regex::new(
        r"^[A-Za-z0-9+/=]{1,1000}$"
    ).unwrap();
}

/// Returns whether a string can possibly be a token.
///
/// This only checks alphabet and length and is meant for rejecting
/// parameters early.
pub fn is_token_syntax(token: &str) -> bool {
    token.len() <= MAX_PARAMETER_LENGTH && TOKEN_SYNTAX.is_match(token)
}


//------------ LightToken ----------------------------------------------------

/// The reference carried inside a token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LightToken {
    /// The identifier of the stored request or response.
    pub id: String,

    /// The name of the party that minted the token.
    pub issuer: String,

    /// When the token was minted.
    pub created: DateTime<Utc>,
}


//------------ TokenCodec ----------------------------------------------------

/// Mints and checks tokens for one issuer.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    secret: String,
}

impl TokenCodec {
    pub fn new(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        TokenCodec { issuer: issuer.into(), secret: secret.into() }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Creates a fresh reference with a new identifier.
    pub fn issue(&self) -> LightToken {
        LightToken {
            id: new_light_id(),
            issuer: self.issuer.clone(),
            created: Utc::now(),
        }
    }

    /// Encodes a reference into an opaque token.
    pub fn encode(&self, token: &LightToken) -> String {
        let timestamp = token.created.format(TIMESTAMP_FORMAT).to_string();
        let digest = self.digest(&token.id, &token.issuer, &timestamp);
        BASE64_ENGINE.encode(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            token.issuer, token.id, timestamp, digest
        ))
    }

    /// Decodes and verifies an opaque token.
    pub fn decode(&self, token: &str) -> Result<LightToken, InvalidToken> {
        if !is_token_syntax(token) {
            return Err(InvalidToken::Syntax)
        }
        let bytes = BASE64_ENGINE.decode(token).map_err(|err| {
            trace!("Cannot base64 decode token: {err}");
            InvalidToken::Encoding
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            InvalidToken::Encoding
        })?;

        let parts: Vec<&str> = text.split(SEPARATOR).collect();
        let [issuer, id, timestamp, digest] = parts.as_slice() else {
            return Err(InvalidToken::Layout)
        };
        if id.is_empty() {
            return Err(InvalidToken::Layout)
        }
        if *issuer != self.issuer {
            return Err(InvalidToken::Issuer)
        }
        let created = NaiveDateTime::parse_from_str(
            timestamp, TIMESTAMP_FORMAT
        ).map_err(|_| InvalidToken::Timestamp)?.and_utc();

        let expected = self.digest(id, issuer, timestamp);
        if !constant_time_eq(expected.as_bytes(), digest.as_bytes()) {
            return Err(InvalidToken::Digest)
        }

        Ok(LightToken {
            id: id.to_string(),
            issuer: issuer.to_string(),
            created,
        })
    }

    fn digest(&self, id: &str, issuer: &str, timestamp: &str) -> String {
        let input = format!(
            "{id}{SEPARATOR}{issuer}{SEPARATOR}{timestamp}{SEPARATOR}{}",
            self.secret
        );
        BASE64_ENGINE.encode(sha256(input.as_bytes()))
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

/// Compares two byte strings without leaking where they differ.
pub fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    // openssl's memcmp panics on different lengths.
    left.len() == right.len() && openssl::memcmp::eq(left, right)
}


//------------ InvalidToken --------------------------------------------------

/// The reason a token was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvalidToken {
    /// Wrong alphabet or length.
    Syntax,

    /// Not base64 or not UTF-8 inside.
    Encoding,

    /// Wrong number of fields or an empty identifier.
    Layout,

    /// Minted by someone else.
    Issuer,

    Timestamp,

    /// The digest does not match, the token was tampered with.
    Digest,
}

impl fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            InvalidToken::Syntax => "invalid token syntax",
            InvalidToken::Encoding => "token is not properly encoded",
            InvalidToken::Layout => "token has an invalid layout",
            InvalidToken::Issuer => "token issuer does not match",
            InvalidToken::Timestamp => "token has an invalid timestamp",
            InvalidToken::Digest => "token digest does not match",
        })
    }
}

impl std::error::Error for InvalidToken {}


//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("specificCommunicationDefinitionProxyserviceRequest", "secret")
    }

    #[test]
    fn decodes_what_it_encodes() {
        let codec = codec();
        let reference = codec.issue();
        let token = codec.encode(&reference);

        assert!(is_token_syntax(&token));
        let decoded = codec.decode(&token).unwrap();
        assert_eq!(decoded.id, reference.id);
        assert_eq!(decoded.issuer, reference.issuer);
        assert_eq!(
            decoded.created.timestamp_millis(),
            reference.created.timestamp_millis()
        );
    }

    #[test]
    fn rejects_wrong_alphabet() {
        assert_eq!(codec().decode("abc$def"), Err(InvalidToken::Syntax));
        assert_eq!(codec().decode(""), Err(InvalidToken::Syntax));
        assert_eq!(
            codec().decode(&"A".repeat(1001)), Err(InvalidToken::Syntax)
        );
    }

    #[test]
    fn rejects_truncated_payload() {
        let codec = codec();
        let token = codec.encode(&codec.issue());
        let truncated = &token[..token.len() / 2];
        assert!(codec.decode(truncated).is_err());

        let layout = BASE64_ENGINE.encode("issuer|id");
        assert_eq!(codec.decode(&layout), Err(InvalidToken::Layout));
    }

    #[test]
    fn rejects_other_issuer() {
        let other = TokenCodec::new("someoneElse", "secret");
        let token = other.encode(&other.issue());
        assert_eq!(codec().decode(&token), Err(InvalidToken::Issuer));
    }

    #[test]
    fn rejects_tampered_digest() {
        let codec = codec();
        let forger = TokenCodec::new(codec.issuer(), "guessed");
        let token = forger.encode(&forger.issue());
        assert_eq!(codec.decode(&token), Err(InvalidToken::Digest));

        let reference = codec.issue();
        let text = String::from_utf8(
            BASE64_ENGINE.decode(codec.encode(&reference)).unwrap()
        ).unwrap();
        let swapped = text.replace(&reference.id, "_someOtherId");
        assert_eq!(
            codec.decode(&BASE64_ENGINE.encode(swapped)),
            Err(InvalidToken::Digest)
        );
    }

    #[test]
    fn constant_time_eq_handles_lengths() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }
}
