// tests/commands_test.rs

mod common;

use common::*;
use nila_rp::command::{Command, CommandResponse, CommandType};
use nila_rp::config::Config;
use nila_rp::discovery::{Discovery, HttpDiscovery};
use nila_rp::dispatcher::process;
use nila_rp::error::NilaRpError;
use nila_rp::http::ReqwestHttpClient;
use nila_rp::jwt;
use nila_rp::site::SiteStore;
use nila_rp::state::{NonceRegistry, StateRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn run(harness: &Harness, command_type: CommandType, params: Value) -> CommandResponse {
    process(Some(&Command::new(command_type, params)), &harness.ctx).await
}

fn query_of(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

// --- get_authorization_url ---

#[tokio::test]
async fn test_authorization_url_registers_state_and_nonce() {
    let harness = Harness::start().await;

    let response = run(&harness, CommandType::GetAuthorizationUrl, json!({ "oxd_id": OXD_ID })).await;

    assert!(response.is_ok(), "{:?}", response);
    let authorization_url = response.data["authorization_url"].as_str().unwrap();
    let state = response.data["state"].as_str().unwrap();
    let nonce = response.data["nonce"].as_str().unwrap();
    assert!(authorization_url.starts_with(&harness.op.url("/authorize?")));

    let query = query_of(authorization_url);
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], CLIENT_ID);
    assert_eq!(query["redirect_uri"], REDIRECT_URI);
    assert_eq!(query["scope"], "openid profile");
    assert_eq!(query["state"], state);
    assert_eq!(query["nonce"], nonce);
    assert!(!query.contains_key("prompt"));

    assert!(harness.registry.is_state_valid(state).await);
    assert!(harness.registry.is_nonce_valid(nonce).await);
}

#[tokio::test]
async fn test_authorization_url_always_requests_openid() {
    let harness = Harness::start().await;

    let response = run(
        &harness,
        CommandType::GetAuthorizationUrl,
        json!({ "oxd_id": OXD_ID, "scope": ["email"], "acr_values": ["basic"], "prompt": "login" }),
    )
    .await;

    let query = query_of(response.data["authorization_url"].as_str().unwrap());
    assert_eq!(query["scope"], "openid email");
    assert_eq!(query["acr_values"], "basic");
    assert_eq!(query["prompt"], "login");
}

#[tokio::test]
async fn test_authorization_url_needs_authorization_endpoint() {
    let op = TestOp::start_empty().await;
    let mut document = op.discovery_document();
    document.as_object_mut().unwrap().remove("authorization_endpoint");
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .mount(&op.server)
        .await;
    let harness = Harness::with_op(op, Config::default()).await;

    let response = run(&harness, CommandType::GetAuthorizationUrl, json!({ "oxd_id": OXD_ID })).await;

    assert_eq!(response.error_code(), Some("missing_op_endpoint"));
    assert_eq!(response.data["kind"], "protocol_violation");
}

// --- check_id_token / check_access_token ---

#[tokio::test]
async fn test_check_id_token_reports_activity_and_timestamps() {
    let harness = Harness::start().await;
    let claims = harness.op.id_token_claims("n1");
    let id_token = harness.op.sign(&claims);

    let response = run(
        &harness,
        CommandType::CheckIdToken,
        json!({ "oxd_id": OXD_ID, "id_token": id_token, "nonce": "n1" }),
    )
    .await;
    assert!(response.is_ok());
    assert_eq!(response.data["active"], true);
    assert_eq!(response.data["issued_at"], claims["iat"]);
    assert_eq!(response.data["expires_at"], claims["exp"]);
    assert_eq!(response.data["claims"]["sub"], "user-1");

    let wrong_nonce = run(
        &harness,
        CommandType::CheckIdToken,
        json!({ "oxd_id": OXD_ID, "id_token": id_token, "nonce": "n2" }),
    )
    .await;
    assert!(wrong_nonce.is_ok());
    assert_eq!(wrong_nonce.data["active"], false);
}

#[tokio::test]
async fn test_check_id_token_rejects_malformed_token() {
    let harness = Harness::start().await;

    let response = run(
        &harness,
        CommandType::CheckIdToken,
        json!({ "oxd_id": OXD_ID, "id_token": "not-a-jwt", "nonce": "n1" }),
    )
    .await;

    assert_eq!(response.error_code(), Some("bad_request_malformed_token"));
}

#[tokio::test]
async fn test_check_access_token_uses_at_hash() {
    let harness = Harness::start().await;
    let mut claims = harness.op.id_token_claims("n1");
    claims["at_hash"] = json!(jwt::token_hash("RS256", "at-1").unwrap());
    let id_token = harness.op.sign(&claims);

    let matching = run(
        &harness,
        CommandType::CheckAccessToken,
        json!({ "oxd_id": OXD_ID, "id_token": id_token, "access_token": "at-1" }),
    )
    .await;
    assert!(matching.is_ok());
    assert_eq!(matching.data["active"], true);
    assert_eq!(matching.data["expires_at"], claims["exp"]);

    let other = run(
        &harness,
        CommandType::CheckAccessToken,
        json!({ "oxd_id": OXD_ID, "id_token": id_token, "access_token": "at-2" }),
    )
    .await;
    assert_eq!(other.data["active"], false);
}

#[tokio::test]
async fn test_check_access_token_without_at_hash_is_inactive() {
    let harness = Harness::start().await;
    let id_token = harness.op.sign(&harness.op.id_token_claims("n1"));

    let response = run(
        &harness,
        CommandType::CheckAccessToken,
        json!({ "oxd_id": OXD_ID, "id_token": id_token, "access_token": "at-1" }),
    )
    .await;

    assert!(response.is_ok());
    assert_eq!(response.data["active"], false);
}

// --- get_user_info ---

#[tokio::test]
async fn test_user_info_is_fetched_with_bearer_token() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("Authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "user-1",
            "email": "user@example.com"
        })))
        .expect(1)
        .mount(&harness.op.server)
        .await;

    let response = run(
        &harness,
        CommandType::GetUserInfo,
        json!({ "oxd_id": OXD_ID, "access_token": "at-1" }),
    )
    .await;

    assert!(response.is_ok());
    assert_eq!(response.data["claims"]["email"], "user@example.com");
}

#[tokio::test]
async fn test_user_info_failure_status() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.op.server)
        .await;

    let response = run(
        &harness,
        CommandType::GetUserInfo,
        json!({ "oxd_id": OXD_ID, "access_token": "expired" }),
    )
    .await;
    assert_eq!(response.error_code(), Some("user_info_not_obtained"));
    assert_eq!(response.data["kind"], "transport_error");

    let missing = run(&harness, CommandType::GetUserInfo, json!({ "oxd_id": OXD_ID })).await;
    assert_eq!(missing.error_code(), Some("bad_request"));
}

// --- register_site / update_site ---

#[tokio::test]
async fn test_register_then_update_keeps_credentials() {
    let harness = Harness::start().await;

    let registered = run(
        &harness,
        CommandType::RegisterSite,
        json!({
            "op_host": harness.op.host(),
            "client_id": "new-client",
            "client_secret": "new-secret",
            "authorization_redirect_uri": "https://app.example/callback"
        }),
    )
    .await;
    assert!(registered.is_ok(), "{:?}", registered);
    let oxd_id = registered.data["oxd_id"].as_str().unwrap().to_string();

    let site = harness.sites.get(&oxd_id).await.unwrap().unwrap();
    assert_eq!(site.client_id, "new-client");
    assert_eq!(site.scope, vec!["openid".to_string(), "profile".to_string()]);

    let updated = run(
        &harness,
        CommandType::UpdateSite,
        json!({
            "oxd_id": oxd_id,
            "authorization_redirect_uri": "https://app.example/v2/callback",
            "scope": ["openid", "email"]
        }),
    )
    .await;
    assert!(updated.is_ok(), "{:?}", updated);

    let site = harness.sites.get(&oxd_id).await.unwrap().unwrap();
    assert_eq!(site.authorization_redirect_uri, "https://app.example/v2/callback");
    assert_eq!(site.scope, vec!["openid".to_string(), "email".to_string()]);
    assert_eq!(site.client_id, "new-client");
    assert_eq!(site.client_secret, "new-secret");

    let secret_change = run(
        &harness,
        CommandType::UpdateSite,
        json!({ "oxd_id": oxd_id, "client_secret": "stolen" }),
    )
    .await;
    assert_eq!(secret_change.error_code(), Some("bad_request"));
    assert_eq!(
        harness.sites.get(&oxd_id).await.unwrap().unwrap().client_secret,
        "new-secret"
    );
}

#[tokio::test]
async fn test_register_site_validates_input() {
    let harness = Harness::start().await;

    let bad_uri = run(
        &harness,
        CommandType::RegisterSite,
        json!({
            "op_host": harness.op.host(),
            "client_id": "c",
            "client_secret": "s",
            "authorization_redirect_uri": "not a url"
        }),
    )
    .await;
    assert_eq!(bad_uri.error_code(), Some("bad_request_invalid_url"));

    let missing_secret = run(
        &harness,
        CommandType::RegisterSite,
        json!({
            "op_host": harness.op.host(),
            "client_id": "c",
            "authorization_redirect_uri": "https://app.example/callback"
        }),
    )
    .await;
    assert_eq!(missing_secret.error_code(), Some("bad_request"));
}

#[tokio::test]
async fn test_register_site_requires_reachable_op() {
    let harness = Harness::start().await;
    let silent_op = TestOp::start_empty().await;

    let response = run(
        &harness,
        CommandType::RegisterSite,
        json!({
            "op_host": silent_op.host(),
            "client_id": "c",
            "client_secret": "s",
            "authorization_redirect_uri": "https://app.example/callback"
        }),
    )
    .await;

    assert_eq!(response.error_code(), Some("op_unreachable"));
}

// --- get_logout_uri ---

#[tokio::test]
async fn test_logout_uri_defaults_from_site() {
    let harness = Harness::start().await;
    let mut site = harness.stored_site().await;
    site.id_token = Some("stored-id-token".to_string());
    harness.sites.update(site).await.unwrap();

    let response = run(
        &harness,
        CommandType::GetLogoutUri,
        json!({ "oxd_id": OXD_ID, "state": "st" }),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response);
    let uri = response.data["uri"].as_str().unwrap();
    assert!(uri.starts_with(&harness.op.url("/logout?")));
    let query = query_of(uri);
    assert_eq!(query["id_token_hint"], "stored-id-token");
    assert_eq!(query["post_logout_redirect_uri"], "https://rp.example/logged-out");
    assert_eq!(query["state"], "st");
    assert!(!query.contains_key("session_state"));
}

#[tokio::test]
async fn test_logout_uri_params_override_site() {
    let harness = Harness::start().await;

    let response = run(
        &harness,
        CommandType::GetLogoutUri,
        json!({
            "oxd_id": OXD_ID,
            "id_token_hint": "hint",
            "post_logout_redirect_uri": "https://rp.example/bye"
        }),
    )
    .await;

    let query = query_of(response.data["uri"].as_str().unwrap());
    assert_eq!(query["id_token_hint"], "hint");
    assert_eq!(query["post_logout_redirect_uri"], "https://rp.example/bye");
}

// --- discovery ---

#[tokio::test]
async fn test_discovery_is_cached_per_host() {
    let op = TestOp::start_empty().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(op.discovery_document()))
        .expect(1)
        .mount(&op.server)
        .await;
    let http = Arc::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap());
    let discovery = HttpDiscovery::new(http, Duration::from_secs(60));

    let first = discovery.resolve(&op.host()).await.unwrap();
    let second = discovery.resolve(&format!("{}/", op.host())).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.issuer, op.issuer());
    assert_eq!(first.token_endpoint, op.url("/token"));
}

#[tokio::test]
async fn test_discovery_requires_token_endpoint() {
    let op = TestOp::start_empty().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": op.issuer(),
            "jwks_uri": op.url("/jwks")
        })))
        .mount(&op.server)
        .await;
    let http = Arc::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap());
    let discovery = HttpDiscovery::new(http, Duration::from_secs(60));

    assert!(matches!(discovery.resolve(&op.host()).await, Err(NilaRpError::Discovery(_))));
}

// --- configuration ---

#[test]
fn test_config_loads_from_yaml_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("nila-rp.yaml");
    let mut config_file = File::create(&config_path).unwrap();
    config_file
        .write_all(
            br#"
algorithms: [RS256, PS256]
leeway_seconds: 30
state_ttl_seconds: 120
default_scopes: [openid, email]
"#,
        )
        .unwrap();

    let config = Config::from_yaml_file(&config_path).unwrap();

    assert_eq!(
        config.validation.algorithms,
        vec![jsonwebtoken::Algorithm::RS256, jsonwebtoken::Algorithm::PS256]
    );
    assert_eq!(config.validation.leeway, Duration::from_secs(30));
    assert_eq!(config.state_ttl, Duration::from_secs(120));
    assert_eq!(config.discovery_cache_ttl, Config::default().discovery_cache_ttl);
    assert_eq!(config.default_scopes, vec!["openid".to_string(), "email".to_string()]);
}

#[test]
fn test_config_rejects_invalid_documents() {
    assert!(matches!(
        Config::from_yaml_str("algorithms: [HS256]"),
        Err(NilaRpError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        Config::from_yaml_str("algorithms: []"),
        Err(NilaRpError::MissingConfiguration(_))
    ));
    assert!(matches!(
        Config::from_yaml_str("state_ttl_seconds: 0"),
        Err(NilaRpError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        Config::from_yaml_str("issuer_url: https://op.example"),
        Err(NilaRpError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        Config::from_yaml_file("/nonexistent/nila-rp.yaml"),
        Err(NilaRpError::InvalidConfiguration(_))
    ));
}
