//! Endpoint-level tests over the assembled router.

mod common;

use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::{PROMPT_URL, harness};
use serde_json::Value;
use sha2::{Digest, Sha256};
use ssas_auth_server::api::{ApiState, build_router};
use ssas_auth_server::notify::ConnectionRegistry;

const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const SIGNER: &str = "PHUuCa71YTZS7HrFvuoEHF1GjjzBUM7Pmo";

async fn server(verifier_accepts: bool) -> (TestServer, common::TestHarness) {
    let harness = harness(verifier_accepts).await;
    let state = ApiState {
        flow: harness.flow.clone(),
        registry: ConnectionRegistry::new(),
    };
    (TestServer::new(build_router(state)).unwrap(), harness)
}

fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[tokio::test]
async fn health_answers_ok() {
    let (server, _) = server(true).await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn authorize_code_flow_redirects_to_the_prompt() {
    let (server, _) = server(true).await;
    let response = server
        .get("/v1/auth/authorize")
        .add_query_param("response_type", "code")
        .add_query_param("redirect_uri", "https://dapp.example.com/signin")
        .add_query_param("code_challenge", s256_challenge(VERIFIER))
        .add_query_param("code_challenge_method", "S256")
        .add_query_param("state", "csrf-123")
        .await;
    response.assert_status(axum::http::StatusCode::SEE_OTHER);
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with(PROMPT_URL));
    assert!(location.contains("redirect_uri="));
    assert!(location.contains("stamp="));
    assert!(location.contains("state=csrf-123"));
}

#[tokio::test]
async fn authorize_sid_flow_returns_a_connection_token() {
    let (server, _) = server(true).await;
    let response = server
        .get("/v1/auth/authorize")
        .add_query_param("response_type", "sid")
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.starts_with("sid:"));
    assert!(body.contains("uid="));
    assert!(body.contains("exp="));
}

#[tokio::test]
async fn authorize_rejects_unknown_response_types() {
    let (server, _) = server(true).await;
    let response = server
        .get("/v1/auth/authorize")
        .add_query_param("response_type", "token")
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_rejects_unsupported_grants() {
    let (server, _) = server(true).await;
    let response = server
        .post("/v1/auth/token")
        .form(&[("grant_type", "client_credentials")])
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn token_endpoint_collapses_bad_codes_to_invalid_grant() {
    let (server, _) = server(true).await;
    let response = server
        .post("/v1/auth/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", "not-a-uuid"),
            ("code_verifier", VERIFIER),
        ])
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn sid_grant_over_http_issues_uncacheable_tokens() {
    let (server, harness) = server(true).await;
    let sid = harness.flow.begin_sid_session().await.unwrap();

    let response = server
        .post("/v1/auth/token")
        .form(&[
            ("grant_type", "sid"),
            ("uid", sid.uid.as_str()),
            ("exp", &sid.exp.to_string()),
            ("public_key", SIGNER),
            ("signature", "signature"),
        ])
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );
    assert_eq!(response.headers().get("pragma").unwrap(), "no-cache");
    let body: Value = response.json();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert_eq!(body["refresh_token"].as_str().unwrap().len(), 24);
}

#[tokio::test]
async fn ssas_callback_pushes_a_code_and_answers_no_content() {
    let (server, harness) = server(true).await;
    let (session, _) = harness
        .flow
        .begin_code_session(
            "https://dapp.example.com/signin",
            &s256_challenge(VERIFIER),
            ssas_auth_server::pkce::CodeChallengeMethod::S256,
        )
        .await
        .unwrap();
    let sid = harness.flow.link_connection(session.stamp, "conn-http").await.unwrap();

    let response = server
        .post(&format!("/v1/ssas/callback?uid={}&exp={}", sid.uid, sid.exp))
        .json(&serde_json::json!({
            "publicKey": SIGNER,
            "signature": "signature",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);
    assert!(harness.notifier.last_for("conn-http").is_some());
}

#[tokio::test]
async fn ssas_callback_rejects_bad_signatures_without_detail() {
    let (server, harness) = server(false).await;
    let (session, _) = harness
        .flow
        .begin_code_session(
            "https://dapp.example.com/signin",
            &s256_challenge(VERIFIER),
            ssas_auth_server::pkce::CodeChallengeMethod::S256,
        )
        .await
        .unwrap();
    let sid = harness.flow.link_connection(session.stamp, "conn-http2").await.unwrap();

    let response = server
        .post(&format!("/v1/ssas/callback?uid={}&exp={}", sid.uid, sid.exp))
        .json(&serde_json::json!({
            "publicKey": SIGNER,
            "signature": "forged",
        }))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn keys_endpoint_serves_an_empty_set_for_hmac() {
    let (server, _) = server(true).await;
    let response = server.get("/v1/auth/keys").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["keys"], serde_json::json!([]));
}
