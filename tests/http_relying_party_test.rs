//! HTTP relying party integration tests using wiremock
//!
//! Verifies the behaviour of `src/rp/http.rs` against a mock provider:
//!
//! - Registration discovers the provider and posts public-client metadata
//!   to the registration endpoint.
//! - Authorization requests carry the required parameters and leave a
//!   pending request record in the medium.
//! - Response validation accepts a matching response and rejects nonce,
//!   state and provider errors.
//! - The orchestrator completes a redirect login end to end.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oidc_web::browser::{BrowsingContext, MemoryBrowsingContext};
use oidc_web::rp::http::PendingRequest;
use oidc_web::rp::id_token::access_token_hash;
use oidc_web::rp::{
    AuthRequestOptions, ClientRegistration, HttpRelyingParty, RegistrationRequest, RelyingParty,
    RpOptions,
};
use oidc_web::storage::{MemoryStorage, StorageMedium};
use oidc_web::{ClientOptions, LoginOptions, OidcWebClient, OidcWebError};

use common::encode_id_token;

const CLIENT_ID: &str = "client-123";
const REDIRECT_URI: &str = "https://app.com/callback";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn provider_metadata(base_url: &str, with_registration: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/authorize", base_url),
        "jwks_uri": format!("{}/jwks", base_url),
        "response_types_supported": ["id_token token"]
    });
    if with_registration {
        body["registration_endpoint"] = serde_json::json!(format!("{}/register", base_url));
    }
    body
}

async fn mount_provider(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(provider_metadata(&server.uri(), true)),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_string_contains("\"token_endpoint_auth_method\":\"none\""))
        .and(body_string_contains("\"application_type\":\"web\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "client_id": CLIENT_ID,
            "redirect_uris": [REDIRECT_URI]
        })))
        .mount(server)
        .await;
}

fn registration_request(issuer: &str) -> RegistrationRequest {
    RegistrationRequest {
        issuer: issuer.to_string(),
        grant_types: vec!["implicit".to_string()],
        redirect_uris: vec![REDIRECT_URI.to_string()],
        response_types: vec!["id_token token".to_string()],
        scope: "openid profile".to_string(),
    }
}

fn relying_party() -> HttpRelyingParty {
    HttpRelyingParty::new(Arc::new(reqwest::Client::new())).with_client_name("Test App")
}

async fn registered(server: &MockServer, rp: &HttpRelyingParty) -> ClientRegistration {
    rp.register(
        &server.uri(),
        &registration_request(&server.uri()),
        &RpOptions::default(),
    )
    .await
    .expect("registration must succeed")
}

fn query_params(uri: &str) -> HashMap<String, String> {
    url::Url::parse(uri)
        .expect("valid uri")
        .query_pairs()
        .into_owned()
        .collect()
}

fn pending_for(store: &MemoryStorage, state: &str) -> PendingRequest {
    let raw = store
        .get_item(&HttpRelyingParty::pending_key(state))
        .unwrap()
        .expect("pending request must be stored");
    serde_json::from_str(&raw).unwrap()
}

fn id_token_for(issuer: &str, nonce: &str, access_token: &str) -> String {
    let now = Utc::now().timestamp();
    encode_id_token(&serde_json::json!({
        "iss": issuer,
        "sub": "alice",
        "aud": CLIENT_ID,
        "exp": now + 3600,
        "iat": now,
        "nonce": nonce,
        "at_hash": access_token_hash(access_token),
        "name": "Alice"
    }))
}

fn response_uri(state: &str, id_token: &str, access_token: &str) -> String {
    response_uri_expiring(state, id_token, access_token, "3600")
}

fn response_uri_expiring(
    state: &str,
    id_token: &str,
    access_token: &str,
    expires_in: &str,
) -> String {
    format!(
        "{REDIRECT_URI}#state={state}&id_token={id_token}&access_token={access_token}\
         &token_type=Bearer&expires_in={expires_in}"
    )
}

fn validation_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<OidcWebError>(),
        Some(OidcWebError::ResponseValidation(_))
    )
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_discovers_and_registers_public_client() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();

    let registration = registered(&server, &rp).await;

    assert_eq!(registration.client_id, CLIENT_ID);
    assert_eq!(registration.provider_url(), server.uri());
    assert_eq!(registration.redirect_uris, vec![REDIRECT_URI.to_string()]);
    assert_eq!(registration.scope.as_deref(), Some("openid profile"));
    let metadata = registration.provider.metadata.expect("metadata kept");
    assert_eq!(metadata.authorization_endpoint, format!("{}/authorize", server.uri()));
}

#[tokio::test]
async fn test_register_without_registration_endpoint_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(provider_metadata(&server.uri(), false)),
        )
        .mount(&server)
        .await;

    let err = relying_party()
        .register(
            &server.uri(),
            &registration_request(&server.uri()),
            &RpOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<OidcWebError>(),
        Some(OidcWebError::Registration(_))
    ));
}

#[tokio::test]
async fn test_register_rejected_by_provider_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(provider_metadata(&server.uri(), true)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_redirect_uri"))
        .mount(&server)
        .await;

    let err = relying_party()
        .register(
            &server.uri(),
            &registration_request(&server.uri()),
            &RpOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_register_without_discovery_document_fails() {
    let server = MockServer::start().await;

    let err = relying_party()
        .register(
            &server.uri(),
            &registration_request(&server.uri()),
            &RpOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<OidcWebError>(),
        Some(OidcWebError::Discovery(_))
    ));
}

// ---------------------------------------------------------------------------
// Authorization requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_request_builds_uri_and_stores_pending_request() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;
    let store = MemoryStorage::new();

    let uri = rp
        .create_request(&registration, &AuthRequestOptions::default(), &store)
        .await
        .unwrap();

    assert!(uri.starts_with(&format!("{}/authorize?", server.uri())));
    let params = query_params(&uri);
    assert_eq!(params["response_type"], "id_token token");
    assert_eq!(params["client_id"], CLIENT_ID);
    assert_eq!(params["redirect_uri"], REDIRECT_URI);
    assert_eq!(params["scope"], "openid profile");
    assert_eq!(params["state"].len(), 22);
    assert_eq!(params["nonce"].len(), 22);

    let pending = pending_for(&store, &params["state"]);
    assert_eq!(pending.nonce, params["nonce"]);
    assert_eq!(pending.client_id, CLIENT_ID);
    assert_eq!(pending.provider, server.uri());
}

#[tokio::test]
async fn test_create_request_passes_prompt_and_login_hint() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;

    let options = AuthRequestOptions {
        scope: Some("openid email".to_string()),
        prompt: Some("consent".to_string()),
        login_hint: Some("alice@example.com".to_string()),
    };
    let uri = rp
        .create_request(&registration, &options, &MemoryStorage::new())
        .await
        .unwrap();

    let params = query_params(&uri);
    assert_eq!(params["scope"], "openid email");
    assert_eq!(params["prompt"], "consent");
    assert_eq!(params["login_hint"], "alice@example.com");
}

// ---------------------------------------------------------------------------
// Response validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_validate_response_accepts_matching_response() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;
    let store = MemoryStorage::new();

    let uri = rp
        .create_request(&registration, &AuthRequestOptions::default(), &store)
        .await
        .unwrap();
    let state = query_params(&uri)["state"].clone();
    let pending = pending_for(&store, &state);

    let id_token = id_token_for(&server.uri(), &pending.nonce, "at-1");
    let session = rp
        .validate_response(&registration, &response_uri(&state, &id_token, "at-1"), &store)
        .await
        .unwrap();

    assert_eq!(session.idp.as_deref(), Some(server.uri().as_str()));
    assert_eq!(session.client_id.as_deref(), Some(CLIENT_ID));
    assert_eq!(session.subject.as_deref(), Some("alice"));
    assert_eq!(session.access_token.as_deref(), Some("at-1"));
    assert_eq!(session.token_type.as_deref(), Some("Bearer"));
    assert_eq!(session.id_token.as_deref(), Some(id_token.as_str()));
    assert_eq!(session.id_claims.unwrap()["name"], "Alice");

    let expires_at = session.expires_at.expect("expires_at derived from expires_in");
    let remaining = (expires_at - Utc::now()).num_seconds();
    assert!((3580..=3600).contains(&remaining), "remaining {remaining}");
}

#[tokio::test]
async fn test_validate_response_tolerates_extreme_expiry_values() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;
    let store = MemoryStorage::new();

    let uri = rp
        .create_request(&registration, &AuthRequestOptions::default(), &store)
        .await
        .unwrap();
    let state = query_params(&uri)["state"].clone();
    let pending = pending_for(&store, &state);

    let now = Utc::now().timestamp();
    let id_token = encode_id_token(&serde_json::json!({
        "iss": server.uri(),
        "sub": "alice",
        "aud": CLIENT_ID,
        "exp": i64::MAX,
        "iat": now,
        "nonce": pending.nonce,
        "at_hash": access_token_hash("at-1"),
    }));
    let response = response_uri_expiring(&state, &id_token, "at-1", &i64::MAX.to_string());

    let session = rp
        .validate_response(&registration, &response, &store)
        .await
        .unwrap();

    assert_eq!(session.subject.as_deref(), Some("alice"));
    assert!(session.expires_at.is_none());
}

#[tokio::test]
async fn test_validate_response_rejects_nonce_mismatch() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;
    let store = MemoryStorage::new();

    let uri = rp
        .create_request(&registration, &AuthRequestOptions::default(), &store)
        .await
        .unwrap();
    let state = query_params(&uri)["state"].clone();

    let id_token = id_token_for(&server.uri(), "forged-nonce", "at-1");
    let err = rp
        .validate_response(&registration, &response_uri(&state, &id_token, "at-1"), &store)
        .await
        .unwrap_err();

    assert!(validation_error(&err));
    assert!(err.to_string().contains("nonce"));
}

#[tokio::test]
async fn test_validate_response_rejects_tampered_access_token() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;
    let store = MemoryStorage::new();

    let uri = rp
        .create_request(&registration, &AuthRequestOptions::default(), &store)
        .await
        .unwrap();
    let state = query_params(&uri)["state"].clone();
    let pending = pending_for(&store, &state);

    let id_token = id_token_for(&server.uri(), &pending.nonce, "at-1");
    let err = rp
        .validate_response(&registration, &response_uri(&state, &id_token, "at-2"), &store)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("at_hash"));
}

#[tokio::test]
async fn test_validate_response_rejects_unknown_state() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;

    let id_token = id_token_for(&server.uri(), "n", "at-1");
    let err = rp
        .validate_response(
            &registration,
            &response_uri("never-issued", &id_token, "at-1"),
            &MemoryStorage::new(),
        )
        .await
        .unwrap_err();

    assert!(validation_error(&err));
}

#[tokio::test]
async fn test_validate_response_surfaces_provider_error() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let rp = relying_party();
    let registration = registered(&server, &rp).await;

    let err = rp
        .validate_response(
            &registration,
            &format!("{REDIRECT_URI}#error=access_denied&error_description=user+cancelled&state=s"),
            &MemoryStorage::new(),
        )
        .await
        .unwrap_err();

    assert!(validation_error(&err));
    assert!(err.to_string().contains("access_denied"));
    assert!(err.to_string().contains("user cancelled"));
}

// ---------------------------------------------------------------------------
// Orchestrator end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_redirect_login_round_trip_against_mock_provider() {
    let server = MockServer::start().await;
    mount_provider(&server).await;

    let medium = Arc::new(MemoryStorage::new());
    let browser = Arc::new(MemoryBrowsingContext::new(REDIRECT_URI));
    let client = OidcWebClient::new(
        ClientOptions::default(),
        Arc::new(relying_party()),
        medium.clone(),
        browser.clone(),
    );

    let auth_uri = client
        .login(&LoginOptions::redirect(server.uri()))
        .await
        .unwrap()
        .unwrap();

    let state = query_params(&auth_uri)["state"].clone();
    let pending = pending_for(&medium, &state);
    assert_eq!(
        medium
            .get_item(&format!("oidc.providers.{state}"))
            .unwrap()
            .as_deref(),
        Some(format!("\"{}\"", server.uri()).as_str())
    );

    let id_token = id_token_for(&server.uri(), &pending.nonce, "at-1");
    browser.set_location(response_uri(&state, &id_token, "at-1"));

    let session = client.current_session().await;

    assert_eq!(session.subject.as_deref(), Some("alice"));
    assert_eq!(browser.current_uri().as_deref(), Some(REDIRECT_URI));
    assert_eq!(client.current_session().await, session);
}
