//! Receiving the callback from the identity provider.

mod common;

use std::time::Duration;
use bytes::Bytes;
use http_body_util::Full;
use hyper::StatusCode;
use hyper::header::{COOKIE, LOCATION};
use eidas_proxy::constants::{
    CSRF_COOKIE_NAME, SAML_STATUS_REQUESTER, SAML_STATUS_SUCCESS,
    SAML_SUB_STATUS_REQUEST_DENIED,
};
use eidas_proxy::light::registry::AttributeRegistry;
use eidas_proxy::test::{
    light_request, settings, TestProxy, TEST_NODE_RESPONSE_URL,
    UNREGISTERED_ATTRIBUTE,
};
use common::*;


#[tokio::test]
async fn callback_without_consent_delivers_to_node() {
    init_logging();
    let proxy = TestProxy::without_consent();
    let request = light_request();
    let request_id = request.id.clone();
    let started = start_authentication(&proxy, request).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "authorization-code"),
        Some(&started.cookie),
    )).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(TEST_NODE_RESPONSE_URL), "{location}");

    let light_response = proxy.take_response(&location).await.unwrap();
    assert!(!light_response.status.failure);
    assert_eq!(light_response.status.status_code, SAML_STATUS_SUCCESS);
    assert_eq!(light_response.in_response_to_id, request_id);
    assert_eq!(
        light_response.subject.as_deref(), Some("EE/CA/60001019906")
    );
    assert_eq!(
        light_response.relay_state.as_deref(), Some("relay-state-123")
    );
    assert_eq!(
        light_response.attribute("PersonIdentifier").unwrap().values,
        vec!["EE/CA/60001019906".to_string()]
    );
    assert_eq!(
        light_response.attribute("DateOfBirth").unwrap().values,
        vec!["2000-01-01".to_string()]
    );

    // The response token can only be used once by the node.
    assert!(proxy.take_response(&location).await.is_none());

    let exchanges = proxy.idp.exchanges();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].code, "authorization-code");
    assert!(exchanges[0].pkce_verifier.starts_with("verifier"));
}

#[tokio::test]
async fn callback_with_consent_shows_consent_page() {
    let proxy = TestProxy::with_consent();
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Demo Service Provider"));
    assert!(body.contains("FamilyName"));
    assert!(body.contains("name=\"token\""));
}

#[tokio::test]
async fn unregistered_attributes_are_dropped() {
    let proxy = TestProxy::without_consent();
    proxy.idp.add_unregistered_attribute();
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    let light_response = proxy.take_response(
        &location(&response)
    ).await.unwrap();

    let registry = AttributeRegistry::eidas_core();
    assert_eq!(light_response.attributes.len(), 4);
    assert!(light_response.attributes.iter().all(|attr| {
        registry.is_registered(&attr.definition)
            && attr.definition.name_uri != UNREGISTERED_ATTRIBUTE
    }));
}

#[tokio::test]
async fn state_cannot_be_replayed() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;
    let uri = callback_uri(&started.state, "code");

    let first = call(&proxy, get(&uri, Some(&started.cookie))).await;
    assert_eq!(first.status(), StatusCode::FOUND);

    let second = call(&proxy, get(&uri, Some(&started.cookie))).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(proxy.idp.exchanges().len(), 1);
}

#[tokio::test]
async fn unknown_state_is_a_bad_request() {
    let proxy = TestProxy::without_consent();
    let response = call(&proxy, get(
        &callback_uri("unknown", "code"), Some("unknown"),
    )).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(proxy.idp.exchanges().is_empty());
}

#[tokio::test]
async fn expired_state_is_like_unknown_state() {
    let mut settings = settings(false);
    settings.correlation_ttl = Duration::from_millis(50);
    let proxy = TestProxy::new(settings);
    let started = start_authentication(&proxy, light_request()).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(proxy.idp.exchanges().is_empty());
}

#[tokio::test]
async fn code_and_error_are_exclusive() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;

    let neither = call(&proxy, get(
        &format!("/IdpResponse?state={}", enc(&started.state)),
        Some(&started.cookie),
    )).await;
    assert_eq!(neither.status(), StatusCode::BAD_REQUEST);

    let both = call(&proxy, get(
        &format!(
            "/IdpResponse?state={}&code=abc&error=invalid_request",
            enc(&started.state)
        ),
        Some(&started.cookie),
    )).await;
    assert_eq!(both.status(), StatusCode::BAD_REQUEST);

    // Neither consumed the state.
    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn state_and_parameters_are_required() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;

    for uri in [
        "/IdpResponse?code=abc".to_string(),
        "/IdpResponse?state=&code=abc".to_string(),
        format!(
            "/IdpResponse?state={0}&state={0}&code=abc", enc(&started.state)
        ),
        format!(
            "/IdpResponse?state={}&code={}",
            enc(&started.state), "c".repeat(1001)
        ),
    ] {
        let response = call(&proxy, get(&uri, Some(&started.cookie))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn missing_cookie_is_a_bad_request() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), None,
    )).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(proxy.idp.exchanges().is_empty());
}

#[tokio::test]
async fn cookie_mismatch_is_fatal() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;
    let other = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&other.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_label(response).await, "illegal-state");
    assert!(proxy.idp.exchanges().is_empty());

    // The attempt is over even with the right cookie.
    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_cancel_is_denied_towards_node() {
    let proxy = TestProxy::without_consent();
    let request = light_request();
    let request_id = request.id.clone();
    let started = start_authentication(&proxy, request).await;

    let response = call(&proxy, get(
        &format!(
            "/IdpResponse?state={}&error=user_cancel\
             &error_description=User+canceled",
            enc(&started.state)
        ),
        Some(&started.cookie),
    )).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let light_response = proxy.take_response(
        &location(&response)
    ).await.unwrap();
    assert!(light_response.status.failure);
    assert_eq!(light_response.status.status_code, SAML_STATUS_REQUESTER);
    assert_eq!(
        light_response.status.sub_status_code.as_deref(),
        Some(SAML_SUB_STATUS_REQUEST_DENIED)
    );
    assert_eq!(
        light_response.status.status_message.as_deref(),
        Some("User canceled the authentication process")
    );
    assert_eq!(light_response.in_response_to_id, request_id);
    assert!(proxy.idp.exchanges().is_empty());
}

#[tokio::test]
async fn user_cancel_with_foreign_cookie_reaches_nobody() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;
    let other = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &format!(
            "/IdpResponse?state={}&error=user_cancel", enc(&started.state)
        ),
        Some(&other.cookie),
    )).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(LOCATION).is_none());
    assert_eq!(error_label(response).await, "illegal-state");
    assert!(proxy.responses.is_empty().await);

    // Only the other authentication is still pending.
    assert_eq!(proxy.correlations.len().await, 1);
}

#[tokio::test]
async fn denial_echoes_relay_state() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &format!(
            "/IdpResponse?state={}&error=user_cancel", enc(&started.state)
        ),
        Some(&started.cookie),
    )).await;

    let light_response = proxy.take_response(
        &location(&response)
    ).await.unwrap();
    assert!(light_response.status.failure);
    assert_eq!(
        light_response.relay_state.as_deref(), Some("relay-state-123")
    );
}

#[tokio::test]
async fn csrf_cookie_is_found_among_foreign_cookies() {
    let proxy = TestProxy::without_consent();

    for foreign in [
        "plain=value",
        "_ga=GA1.2.3.4",
        "quoted=\"x\"",
        "bare",
        "json={\"a\":1}",
        "spaced=a b",
        "comma=a,b",
    ] {
        let started = start_authentication(&proxy, light_request()).await;
        let request = hyper::Request::builder()
            .uri(callback_uri(&started.state, "code"))
            .header(
                COOKIE,
                format!("{foreign}; {CSRF_COOKIE_NAME}={}", started.cookie),
            )
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = call(&proxy, request).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{foreign}");
    }
}

#[tokio::test]
async fn other_idp_errors_are_upstream_errors() {
    let proxy = TestProxy::without_consent();
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &format!(
            "/IdpResponse?state={}&error=invalid_scope",
            enc(&started.state)
        ),
        Some(&started.cookie),
    )).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_label(response).await, "upstream-protocol-error");
}

#[tokio::test]
async fn failed_exchange_is_surfaced() {
    let proxy = TestProxy::without_consent();
    proxy.idp.set_claims(None);
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_label(response).await, "idp-exchange-failed");
    assert_eq!(proxy.idp.exchanges().len(), 1);
}

#[tokio::test]
async fn slow_exchange_times_out() {
    let mut settings = settings(false);
    settings.upstream_timeout = Duration::from_millis(100);
    let proxy = TestProxy::new(settings);
    proxy.idp.set_delay(Some(Duration::from_secs(2)));
    let started = start_authentication(&proxy, light_request()).await;

    let response = call(&proxy, get(
        &callback_uri(&started.state, "code"), Some(&started.cookie),
    )).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_label(response).await, "upstream-timeout");
}
