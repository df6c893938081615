use tokio::net::TcpListener;
use tracing::info;
use vandi::config::AppConfig;
use vandi::db::{init_pool, migrate};
use vandi::error::AppError;
use vandi::routes::create_router;
use vandi::services::trips::TripService;
use vandi::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let ride_config = config.load_ride_config().await?;
    let db = init_pool(&config.database_url).await?;
    migrate(&db).await?;

    let trips = TripService::new(db, ride_config);
    let state = AppState::new(trips);

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,vandi=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
