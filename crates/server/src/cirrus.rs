//! Signature verification against a Cirrus full node.
//!
//! The node's wallet API answers `verifymessage` with either a JSON boolean
//! or the strings "True"/"False" depending on version, so the response is
//! parsed leniently.

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("verification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected verification response: {0}")]
    UnexpectedResponse(String),
}

/// Seam for the external signature check, so flows can be tested without a
/// running node.
pub trait WalletVerifier: Send + Sync {
    fn verify_signed_message<'a>(
        &'a self,
        message: &'a str,
        signer: &'a str,
        signature: &'a str,
    ) -> BoxFuture<'a, Result<bool, VerifierError>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyMessageRequest<'a> {
    message: &'a str,
    external_address: &'a str,
    signature: &'a str,
}

pub struct CirrusClient {
    client: reqwest::Client,
    verify_url: String,
}

impl CirrusClient {
    pub fn new(api_url: &str, api_port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            verify_url: format!(
                "{}:{api_port}/api/Wallet/verifymessage",
                api_url.trim_end_matches('/')
            ),
        }
    }
}

impl WalletVerifier for CirrusClient {
    #[tracing::instrument(skip_all, fields(signer = %signer))]
    fn verify_signed_message<'a>(
        &'a self,
        message: &'a str,
        signer: &'a str,
        signature: &'a str,
    ) -> BoxFuture<'a, Result<bool, VerifierError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.verify_url)
                .json(&VerifyMessageRequest {
                    message,
                    external_address: signer,
                    signature,
                })
                .send()
                .await?
                .error_for_status()?;
            let body: serde_json::Value = response.json().await?;
            match &body {
                serde_json::Value::Bool(b) => Ok(*b),
                serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(VerifierError::UnexpectedResponse(other.to_string())),
                },
                other => Err(VerifierError::UnexpectedResponse(other.to_string())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CirrusClient {
        let uri = server.uri();
        let (base, port) = uri.rsplit_once(':').unwrap();
        CirrusClient::new(base, port.parse().unwrap())
    }

    #[tokio::test]
    async fn posts_message_signer_and_signature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/Wallet/verifymessage"))
            .and(body_partial_json(serde_json::json!({
                "message": "id.example.com/v1/ssas/callback",
                "externalAddress": "PHkh...",
                "signature": "sig",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(true))
            .expect(1)
            .mount(&server)
            .await;

        let verified = client_for(&server)
            .await
            .verify_signed_message("id.example.com/v1/ssas/callback", "PHkh...", "sig")
            .await
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn accepts_boolean_as_string_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/Wallet/verifymessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json("False"))
            .mount(&server)
            .await;

        let verified = client_for(&server)
            .await
            .verify_signed_message("msg", "PHkh...", "sig")
            .await
            .unwrap();
        assert!(!verified);
    }

    #[tokio::test]
    async fn http_errors_surface_as_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify_signed_message("msg", "PHkh...", "sig")
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::Transport(_)));
    }

    #[tokio::test]
    async fn unexpected_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify_signed_message("msg", "PHkh...", "sig")
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::UnexpectedResponse(_)));
    }
}
