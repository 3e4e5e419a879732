use std::sync::Arc;

use sea_orm::Database;
use ssas_auth_server::api::{ApiState, start_webserver};
use ssas_auth_server::cirrus::CirrusClient;
use ssas_auth_server::config::{JwtMode, load_config_or_panic};
use ssas_auth_server::encryption::aes_cbc::TwoWayCipher;
use ssas_auth_server::flow::AuthFlowService;
use ssas_auth_server::jwt::{HmacJwtIssuer, JwtIssuer, RsaJwtIssuer};
use ssas_auth_server::notify::ConnectionRegistry;
use ssas_auth_server::store::AuthStore;
use ssas_auth_server::{AppResources, notify::AuthNotifier};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "ssas_auth_server=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    let _ = dotenvy::dotenv();

    initialize_tracing();

    let config = Arc::new(load_config_or_panic());

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    let resources = AppResources {
        db: db.clone(),
        config: config.clone(),
    };

    let cipher = TwoWayCipher::new(
        resources
            .config
            .encryption_key_bytes()
            .expect("encryption key validated at load time"),
    );

    let issuer: Arc<dyn JwtIssuer> = match config.jwt.mode {
        JwtMode::Hmac => Arc::new(HmacJwtIssuer::new(
            config.jwt.hmac_secret.as_deref().unwrap_or_default(),
        )),
        JwtMode::Rsa => Arc::new(
            RsaJwtIssuer::new(
                config.jwt.rsa_private_pem.as_deref().unwrap_or_default(),
                config.jwt.key_id.as_deref().unwrap_or("default"),
                config.jwt.public_modulus.as_deref().unwrap_or_default(),
                config.jwt.public_exponent.as_deref().unwrap_or("AQAB"),
            )
            .expect("Failed to load RSA signing key"),
        ),
    };

    let verifier = Arc::new(CirrusClient::new(
        &config.cirrus.api_url,
        config.cirrus.api_port,
    ));
    let registry = ConnectionRegistry::new();
    let notifier: Arc<dyn AuthNotifier> = Arc::new(registry.clone());

    let flow = AuthFlowService::new(
        AuthStore::new(db),
        issuer,
        verifier,
        notifier,
        cipher,
        &config.authority,
        &config.prompt_url,
    );

    let state = ApiState { flow, registry };
    start_webserver(state, &config.bind_address).await?;
    Ok(())
}
