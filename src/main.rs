use std::net::SocketAddr;
use std::sync::Arc;

use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_intake_api::config::Config;
use lead_intake_api::db::Database;
use lead_intake_api::db_storage::PgLeadStore;
use lead_intake_api::handlers::{self, AppState};
use lead_intake_api::intake::IntakeService;
use lead_intake_api::notification::WhatsAppNotifier;
use lead_intake_api::storage::{JsonFileStore, LeadRepository};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the lead store, and the WhatsApp
/// notifier, then serves the HTTP API. The store connects lazily, so the
/// server starts even when storage is temporarily unreachable.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_intake_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = match &config.database_url {
        Some(url) => {
            let db = Database::connect_lazy(url)?;
            LeadRepository::Postgres(PgLeadStore::new(db.pool))
        }
        None => LeadRepository::File(JsonFileStore::in_dir(&config.data_dir)),
    };
    tracing::info!("Lead store: {}", store.backend_name());

    let notifier = WhatsAppNotifier::new(config.delivery_mode(), &config.whatsapp_target_number)?;
    tracing::info!(
        "WhatsApp notifier initialized (offline: {}, target: {})",
        notifier.mode().is_offline(),
        notifier.target_number()
    );

    let app_state = Arc::new(AppState {
        intake: IntakeService::new(Arc::new(store), Arc::new(notifier)),
        admin_token: config.admin_token.clone(),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Health check stays outside the rate limiter
    let api = handlers::api_routes::<LeadRepository, WhatsAppNotifier>().layer(GovernorLayer {
        config: governor_conf,
    });
    let app = handlers::app(app_state, api);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
