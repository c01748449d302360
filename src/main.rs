use axum::http::Method;
use club_directory::{connect_to_db, db::PgRepository};
use envconfig::Envconfig;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    /// Root directory of every uploaded file.
    #[envconfig(from = "STORAGE_ROOT", default = "storage")]
    pub storage_root: String,
    #[envconfig(from = "LOG_FORMAT", default = "text")]
    pub log_format: String,
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::init_from_env()?;
    init_tracing(&config.log_format);

    let storage_root = PathBuf::from(&config.storage_root);
    tokio::fs::create_dir_all(&storage_root).await?;
    tracing::info!(storage_root = %storage_root.display(), "serving uploads");

    let repository = Arc::new(PgRepository::new(connect_to_db(&config.db_url)?));
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = club_directory::app(&storage_root, repository.clone(), repository)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    tracing::info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
