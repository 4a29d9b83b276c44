//! An identity provider speaking OpenID Connect.

use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info, trace};
use openidconnect::core::{
    CoreAuthDisplay, CoreAuthPrompt, CoreErrorResponseType, CoreGenderClaim,
    CoreJsonWebKey, CoreJsonWebKeyType, CoreJsonWebKeyUse,
    CoreJweContentEncryptionAlgorithm, CoreJwsSigningAlgorithm,
    CoreProviderMetadata, CoreResponseType, CoreRevocableToken,
    CoreRevocationErrorResponse, CoreTokenIntrospectionResponse, CoreTokenType,
};
use openidconnect::{
    AdditionalClaims, AuthenticationContextClass, AuthenticationFlow,
    AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
    EmptyExtraTokenFields, IdTokenClaims, IdTokenFields, IssuerUrl,
    LanguageTag, Nonce, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    Scope, StandardErrorResponse, StandardTokenResponse,
};
use serde::{Deserialize, Serialize};
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::config::OidcConfig;
use crate::light::{LightRequest, LightResponse};
use crate::light::registry::AttributeRegistry;
use super::{AuthenticationRequest, IdentityProvider};
use super::claims::{IdentityClaims, LevelOfAssurance};
use super::httpclient::IdpHttpClient;


//------------ Claims and Client Types ---------------------------------------

/// Claims about the citizen outside the standard claim set.
///
/// Providers issuing eIDAS identities tend to put the person's data into
/// a `profile_attributes` object rather than the standard claims.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProfileClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_attributes: Option<ProfileAttributes>,
}

impl AdditionalClaims for ProfileClaims {}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProfileAttributes {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
}

pub type ProxyTokenResponse = StandardTokenResponse<
    IdTokenFields<
        ProfileClaims,
        EmptyExtraTokenFields,
        CoreGenderClaim,
        CoreJweContentEncryptionAlgorithm,
        CoreJwsSigningAlgorithm,
        CoreJsonWebKeyType,
    >,
    CoreTokenType,
>;

pub type ProxyClient = Client<
    ProfileClaims,
    CoreAuthDisplay,
    CoreGenderClaim,
    CoreJweContentEncryptionAlgorithm,
    CoreJwsSigningAlgorithm,
    CoreJsonWebKeyType,
    CoreJsonWebKeyUse,
    CoreJsonWebKey,
    CoreAuthPrompt,
    StandardErrorResponse<CoreErrorResponseType>,
    ProxyTokenResponse,
    CoreTokenType,
    CoreTokenIntrospectionResponse,
    CoreRevocableToken,
    CoreRevocationErrorResponse,
>;

pub type ProxyIdTokenClaims = IdTokenClaims<ProfileClaims, CoreGenderClaim>;


//------------ OidcIdentityProvider ------------------------------------------

pub struct OidcIdentityProvider {
    client: ProxyClient,
    scopes: Vec<String>,
    ui_locales: Option<String>,
    http: IdpHttpClient,
    response_issuer: String,
    registry: AttributeRegistry,
}

impl OidcIdentityProvider {
    /// Discovers the provider and creates a client for it.
    pub async fn discover(
        conf: &OidcConfig,
        timeout: Duration,
        response_issuer: String,
        registry: AttributeRegistry,
    ) -> ProxyResult<Self> {
        let issuer_url = IssuerUrl::new(conf.issuer_url.to_string()).map_err(|err| {
            Error::custom(format!("OpenID Connect: invalid issuer URL: {err}"))
        })?;

        let http = IdpHttpClient::new(issuer_url.as_str(), timeout)?;

        info!("OpenID Connect: discovering provider {}", http.issuer());
        let discovery_http = http.clone();
        let meta = CoreProviderMetadata::discover_async(
            issuer_url, move |req| {
                let http = discovery_http.clone();
                async move { http.execute(req).await }
            }
        ).await.map_err(|err| {
            Error::custom(format!("OpenID Connect: discovery failed: {err}"))
        })?;

        // Note: we still haven't actually verified that the client id and
        // secret are correct, that will only happen when we try to exchange
        // a code for tokens.
        let client = ProxyClient::from_provider_metadata(
            meta,
            ClientId::new(conf.client_id.clone()),
            Some(ClientSecret::new(conf.client_secret.clone())),
        );

        let redirect_uri = RedirectUrl::new(
            conf.redirect_uri.to_string()
        ).map_err(|err| {
            Error::custom(format!("OpenID Connect: invalid redirect URI: {err}"))
        })?;
        debug!("OpenID Connect: redirect URI set to {}", redirect_uri.as_str());

        Ok(OidcIdentityProvider {
            client: client.set_redirect_uri(redirect_uri),
            scopes: conf.scopes.clone(),
            ui_locales: conf.ui_locales.clone(),
            http,
            response_issuer,
            registry,
        })
    }

    fn identity_claims(claims: &ProxyIdTokenClaims) -> IdentityClaims {
        let profile = claims.additional_claims()
            .profile_attributes.clone().unwrap_or_default();
        IdentityClaims {
            subject: claims.subject().to_string(),
            acr: claims.auth_context_ref().map(|acr| acr.to_string()),
            given_name: profile.given_name.or_else(|| {
                claims.given_name()
                    .and_then(|name| name.get(None))
                    .map(|name| name.to_string())
            }),
            family_name: profile.family_name.or_else(|| {
                claims.family_name()
                    .and_then(|name| name.get(None))
                    .map(|name| name.to_string())
            }),
            date_of_birth: profile.date_of_birth.or_else(|| {
                claims.birthdate().map(|date| date.to_string())
            }),
        }
    }
}

#[async_trait]
impl IdentityProvider for OidcIdentityProvider {
    fn authentication_request(
        &self, request: &LightRequest, state: &str,
    ) -> ProxyResult<AuthenticationRequest> {
        let (pkce_challenge, pkce_verifier) =
            PkceCodeChallenge::new_random_sha256();

        let state = state.to_string();
        let mut auth_request = self.client
            .authorize_url(
                AuthenticationFlow::<CoreResponseType>::AuthorizationCode,
                move || CsrfToken::new(state),
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        // The "openid" scope is sent automatically.
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        if let Some(level) = LevelOfAssurance::from_eidas_uri(
            &request.level_of_assurance
        ) {
            auth_request = auth_request.add_auth_context_value(
                AuthenticationContextClass::new(level.as_acr().to_string())
            );
        }

        if let Some(locales) = &self.ui_locales {
            for locale in locales.split_whitespace() {
                auth_request = auth_request.add_ui_locale(
                    LanguageTag::new(locale.to_string())
                );
            }
        }

        let (url, _state, nonce) = auth_request.url();
        debug!(
            "OpenID Connect: authentication URL for request {} is {}",
            request.id, url
        );

        Ok(AuthenticationRequest {
            url,
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        })
    }

    async fn exchange(
        &self,
        code: &str,
        pkce_verifier: &str,
        nonce: &str,
        request: &LightRequest,
    ) -> ProxyResult<LightResponse> {
        debug!(
            "OpenID Connect: exchanging code for request {} with {}",
            request.id, self.http.issuer()
        );
        let http = self.http.clone();
        let token_response: ProxyTokenResponse = self.client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(move |req| async move { http.execute(req).await })
            .await
            .map_err(|err| {
                Error::IdpExchange(format!("code exchange failed: {err}"))
            })?;

        let id_token_verifier = self.client.id_token_verifier();
        let claims = token_response
            .extra_fields()
            .id_token()
            .ok_or_else(|| {
                Error::IdpExchange("token response lacks an ID token".into())
            })?
            .claims(&id_token_verifier, &Nonce::new(nonce.to_string()))
            .map_err(|err| {
                Error::IdpExchange(format!(
                    "ID token verification failed: {err}"
                ))
            })?;

        trace!("OpenID Connect: ID token claims: {:?}", claims);

        Self::identity_claims(claims).into_light_response(
            request, &self.response_issuer, &self.registry
        )
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_claims_are_optional() {
        let claims: ProfileClaims = serde_json::from_str("{}").unwrap();
        assert!(claims.profile_attributes.is_none());

        let claims: ProfileClaims = serde_json::from_str(r#"{
            "profile_attributes": {
                "date_of_birth": "1980-01-08",
                "family_name": "JÕEORG",
                "given_name": "JAAK-KRISTJAN"
            }
        }"#).unwrap();
        let profile = claims.profile_attributes.unwrap();
        assert_eq!(profile.family_name.as_deref(), Some("JÕEORG"));
        assert_eq!(profile.date_of_birth.as_deref(), Some("1980-01-08"));
    }
}
