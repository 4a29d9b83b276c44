//! Receiving light requests from the node.

mod common;

use hyper::{Method, StatusCode};
use bytes::Bytes;
use eidas_proxy::constants::{
    CSRF_COOKIE_NAME, SAML_STATUS_REQUESTER, SAML_SUB_STATUS_REQUEST_DENIED,
};
use eidas_proxy::light::registry::AttributeRegistry;
use eidas_proxy::test::{
    light_request, query_param, TestProxy, TEST_IDP_AUTH_URL,
    TEST_NODE_RESPONSE_URL,
};
use common::*;


#[tokio::test]
async fn valid_request_redirects_to_idp() {
    init_logging();
    let proxy = TestProxy::with_consent();
    let token = proxy.put_request(light_request()).await;

    let response = call(&proxy, get(
        &format!("/ProxyServiceRequest?token={}", enc(&token)), None
    )).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(TEST_IDP_AUTH_URL), "{location}");

    let state = query_param(&location, "state").unwrap();
    assert_eq!(state.len(), 43);

    let cookie = set_cookie(&response).unwrap();
    assert_eq!(
        cookie,
        format!(
            "{CSRF_COOKIE_NAME}={state}; Max-Age=300; Path=/IdpResponse; \
             Secure; HttpOnly; SameSite=Lax"
        )
    );
}

#[tokio::test]
async fn post_is_handled_like_get() {
    let proxy = TestProxy::with_consent();
    let token = proxy.put_request(light_request()).await;

    let response = call(&proxy, post_form(
        "/ProxyServiceRequest", &format!("token={}", enc(&token))
    )).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with(TEST_IDP_AUTH_URL));
}

#[tokio::test]
async fn token_is_consumed() {
    let proxy = TestProxy::with_consent();
    let token = proxy.put_request(light_request()).await;
    let uri = format!("/ProxyServiceRequest?token={}", enc(&token));

    let first = call(&proxy, get(&uri, None)).await;
    assert_eq!(first.status(), StatusCode::FOUND);

    let second = call(&proxy, get(&uri, None)).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_label(second).await, "bad-request");
}

#[tokio::test]
async fn malformed_token_parameters_are_rejected() {
    let proxy = TestProxy::with_consent();
    let token = proxy.put_request(light_request()).await;

    for uri in [
        "/ProxyServiceRequest".to_string(),
        "/ProxyServiceRequest?token=".to_string(),
        "/ProxyServiceRequest?token=not%20base64%21".to_string(),
        format!("/ProxyServiceRequest?token={}", "a".repeat(1001)),
        format!(
            "/ProxyServiceRequest?token={}&token={}",
            enc(&token), enc(&token)
        ),
        // Well-formed but not minted by the node.
        "/ProxyServiceRequest?token=c29tZXRoaW5nfGVsc2U%3D".to_string(),
    ] {
        let response = call(&proxy, get(&uri, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    // The repeated parameter did not consume the request.
    let response = call(&proxy, get(
        &format!("/ProxyServiceRequest?token={}", enc(&token)), None
    )).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn unsupported_sp_type_is_denied_towards_node() {
    let proxy = TestProxy::with_consent();
    let mut request = light_request();
    request.sp_type = Some("private".into());
    let request_id = request.id.clone();
    let token = proxy.put_request(request).await;

    let response = call(&proxy, get(
        &format!("/ProxyServiceRequest?token={}", enc(&token)), None
    )).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(TEST_NODE_RESPONSE_URL), "{location}");
    assert!(set_cookie(&response).is_none());

    let light_response = proxy.take_response(&location).await.unwrap();
    assert!(light_response.status.failure);
    assert_eq!(light_response.status.status_code, SAML_STATUS_REQUESTER);
    assert_eq!(
        light_response.status.sub_status_code.as_deref(),
        Some(SAML_SUB_STATUS_REQUEST_DENIED)
    );
    assert_eq!(
        light_response.status.status_message.as_deref(),
        Some("Service provider type not supported. Allowed types: public")
    );
    assert_eq!(light_response.in_response_to_id, request_id);
}

#[tokio::test]
async fn missing_sp_type_is_denied() {
    let proxy = TestProxy::with_consent();
    let mut request = light_request();
    request.sp_type = None;
    let err = proxy.service.validate_request(&request).unwrap_err();
    assert_eq!(err.denied_request_id(), Some(request.id.as_str()));
}

#[tokio::test]
async fn invalid_requests_are_bad_requests() {
    let proxy = TestProxy::with_consent();
    let registry = AttributeRegistry::eidas_core();

    let mut bad_country = light_request();
    bad_country.citizen_country_code = "XX".into();

    let mut lower_country = light_request();
    lower_country.citizen_country_code = "ee".into();

    let mut bad_name_id = light_request();
    bad_name_id.name_id_format = Some(
        "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".into()
    );

    let mut mixed = light_request();
    mixed.requested_attributes.push(
        registry.by_friendly_name("LegalName").unwrap().clone()
    );

    for request in [bad_country, lower_country, bad_name_id, mixed] {
        let token = proxy.put_request(request.clone()).await;
        let response = call(&proxy, get(
            &format!("/ProxyServiceRequest?token={}", enc(&token)), None
        )).await;
        assert_eq!(
            response.status(), StatusCode::BAD_REQUEST, "{:?}", request
        );
        assert!(set_cookie(&response).is_none());
    }
}

#[tokio::test]
async fn legal_person_request_is_accepted() {
    let proxy = TestProxy::with_consent();
    let registry = AttributeRegistry::eidas_core();
    let mut request = light_request();
    request.name_id_format = Some(
        "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent".into()
    );
    request.requested_attributes = ["LegalName", "LegalPersonIdentifier"]
        .into_iter()
        .map(|name| registry.by_friendly_name(name).unwrap().clone())
        .collect();
    assert!(proxy.service.validate_request(&request).is_ok());
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let proxy = TestProxy::with_consent();

    let response = call(&proxy, get("/nothing/here", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&proxy, request(
        Method::PUT, "/ProxyServiceRequest?token=abc", None, Bytes::new()
    )).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = call(&proxy, request(
        Method::POST, "/IdpResponse?state=abc&code=def", None, Bytes::new()
    )).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn heartbeat_reports_up() {
    let proxy = TestProxy::with_consent();
    let response = call(&proxy, get("/heartbeat", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(
        &body_string(response).await
    ).unwrap();
    assert_eq!(body["status"], "UP");
    assert!(body["upTime"].as_i64().unwrap() >= 0);
}
