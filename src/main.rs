use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use enrollpay::config::{Config, DatabaseConfig, StorageBackend};
use enrollpay::middleware::{RequestId, TokenAuth, TokenVerifier};
use enrollpay::modules::gateways::{CinetPayClient, PaymentGateway};
use enrollpay::modules::payments::services::LogNotifier;
use enrollpay::modules::payments::{InMemoryPaymentStore, MySqlPaymentStore, PaymentStore};
use enrollpay::{telemetry, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    telemetry::init_tracing(&config.app.log_level, config.app.log_format)?;

    tracing::info!(
        env = %config.app.env,
        storage = ?config.app.storage_backend,
        simulation = config.payments.simulation_enabled,
        "Starting enrollment payment service"
    );

    let store: Arc<dyn PaymentStore> = match (config.app.storage_backend, &config.database) {
        (StorageBackend::Mysql, Some(database)) => {
            let pool = database.create_pool().await?;
            if database.run_migrations {
                DatabaseConfig::migrate(&pool).await?;
                tracing::info!("Database migrations applied");
            }
            tracing::info!(
                max_connections = database.max_connections,
                "Database pool initialized"
            );
            Arc::new(MySqlPaymentStore::new(pool))
        }
        (StorageBackend::Mysql, None) => anyhow::bail!("DATABASE_URL not set"),
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(InMemoryPaymentStore::new())
        }
    };

    let gateway: Arc<dyn PaymentGateway> = Arc::new(CinetPayClient::new(&config.cinetpay)?);
    let state = AppState::new(
        store,
        gateway,
        Arc::new(LogNotifier),
        config.payments.clone(),
        TokenVerifier::new(&config.security.auth_token_secret),
        config.security.webhook_rate_limit_per_minute,
    )?;

    let bind_address = config.server.bind_address();
    let cors_origin = config.security.cors_allowed_origin.clone();

    tracing::info!(address = %bind_address, workers = config.server.workers, "Server starting");

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allowed_methods(vec!["GET", "POST"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .max_age(3600),
            None => Cors::default(),
        };
        let state = state.clone();

        App::new()
            .wrap(TokenAuth::new(state.token_verifier.clone()))
            .wrap(cors)
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
