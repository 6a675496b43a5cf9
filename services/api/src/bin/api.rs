//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        Argon2Hasher, DbAdapter, HmacTokenService, LogMailer, MokaPendingStore,
        RandomOtpGenerator, SmtpMailer,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{self, rest::ApiDoc, AppState, Ports},
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use shop_core::ports::{Clock, MailService, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let otp_ttl = config.otp_ttl;
    let pending_ttl = otp_ttl
        .to_std()
        .map_err(|e| ConfigError::InvalidValue("OTP_TTL_MINUTES".to_string(), e.to_string()))?;

    let mailer: Arc<dyn MailService> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Sending mail through SMTP relay");
            Arc::new(SmtpMailer::new(smtp, &config.mail_from)?)
        }
        None => {
            warn!("SMTP_HOST is not set; verification emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let ports = Ports {
        db: db_adapter,
        pending: Arc::new(MokaPendingStore::new(pending_ttl, config.pending_capacity)),
        mailer,
        hasher: Arc::new(Argon2Hasher::default()),
        otp: Arc::new(RandomOtpGenerator),
        tokens: Arc::new(HmacTokenService::new(
            config.token_secret.clone(),
            config.token_ttl,
            clock.clone(),
        )),
        clock,
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(ports, otp_ttl, config.cart_stock_policy));

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
