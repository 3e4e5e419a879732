//! Shared fixtures for the end-to-end flow tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use ssas_auth_server::cirrus::{VerifierError, WalletVerifier};
use ssas_auth_server::encryption::aes_cbc::TwoWayCipher;
use ssas_auth_server::flow::AuthFlowService;
use ssas_auth_server::jwt::HmacJwtIssuer;
use ssas_auth_server::notify::AuthNotifier;
use ssas_auth_server::store::AuthStore;

pub const CIPHER_KEY: [u8; 32] = [11u8; 32];
pub const AUTHORITY: &str = "id.example.com";
pub const PROMPT_URL: &str = "https://app.example.com/auth";
pub const HMAC_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Wallet verifier with a fixed verdict.
pub struct StaticVerifier(pub bool);

impl WalletVerifier for StaticVerifier {
    fn verify_signed_message<'a>(
        &'a self,
        _message: &'a str,
        _signer: &'a str,
        _signature: &'a str,
    ) -> BoxFuture<'a, Result<bool, VerifierError>> {
        let verdict = self.0;
        Box::pin(async move { Ok(verdict) })
    }
}

/// Captures every push so tests can assert on delivered payloads.
#[derive(Default)]
pub struct RecordingNotifier {
    pub pushes: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn last_for(&self, connection_id: &str) -> Option<String> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == connection_id)
            .map(|(_, payload)| payload.clone())
    }
}

impl AuthNotifier for RecordingNotifier {
    fn push(&self, connection_id: &str, payload: String) {
        self.pushes
            .lock()
            .unwrap()
            .push((connection_id.to_string(), payload));
    }
}

pub async fn memory_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    let backend = db.get_database_backend();
    for ddl in [
        r#"CREATE TABLE auth_session (
            stamp TEXT PRIMARY KEY NOT NULL,
            audience TEXT,
            code_challenge TEXT,
            challenge_method TEXT,
            connection_id TEXT UNIQUE,
            created_at TEXT NOT NULL
        )"#,
        r#"CREATE TABLE auth_code (
            value TEXT PRIMARY KEY NOT NULL,
            signer TEXT NOT NULL,
            stamp TEXT NOT NULL,
            expiry TEXT NOT NULL
        )"#,
        r#"CREATE TABLE auth_success (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL,
            audience TEXT,
            connection_id TEXT,
            expiry TEXT NOT NULL
        )"#,
        r#"CREATE TABLE token_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            refresh_token TEXT NOT NULL UNIQUE,
            auth_success_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )"#,
        r#"CREATE TABLE admin (
            address TEXT PRIMARY KEY NOT NULL
        )"#,
    ] {
        db.execute(Statement::from_string(backend, ddl))
            .await
            .expect("create table");
    }
    db
}

pub struct TestHarness {
    pub flow: AuthFlowService,
    pub store: AuthStore,
    pub notifier: Arc<RecordingNotifier>,
    pub cipher: TwoWayCipher,
}

pub async fn harness(verifier_accepts: bool) -> TestHarness {
    let db = Arc::new(memory_db().await);
    let store = AuthStore::new(db);
    let notifier = Arc::new(RecordingNotifier::default());
    let cipher = TwoWayCipher::new(CIPHER_KEY);
    let flow = AuthFlowService::new(
        store.clone(),
        Arc::new(HmacJwtIssuer::new(HMAC_SECRET)),
        Arc::new(StaticVerifier(verifier_accepts)),
        notifier.clone(),
        cipher.clone(),
        AUTHORITY,
        PROMPT_URL,
    );
    TestHarness {
        flow,
        store,
        notifier,
        cipher,
    }
}
