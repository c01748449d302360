use std::{io, path::Path, sync::Arc};

use axum::{http::StatusCode, routing::get_service, Extension, Router};
use deadpool::managed::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};
use tower_http::services::ServeDir;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod service;
pub mod storage;
pub mod upload;
pub mod validate;

use db::{ClubRepository, EventRepository};
use service::{ClubService, EventService};
use storage::{BlobStorage, LocalStorage};

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn connect_to_db(db_url: &str) -> anyhow::Result<DbPool> {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Ok(Pool::builder(db_config).build()?)
}

/// The API under `/api` and the blobs below `storage_root` under `/storage`.
pub fn app(
    storage_root: &Path,
    clubs: Arc<dyn ClubRepository>,
    events: Arc<dyn EventRepository>,
) -> Router {
    let storage: Arc<dyn BlobStorage> = Arc::new(LocalStorage::new(storage_root));
    let club_service = Arc::new(ClubService::new(
        clubs.clone(),
        events.clone(),
        storage.clone(),
    ));
    let event_service = Arc::new(EventService::new(clubs, events, storage));

    let serve = get_service(ServeDir::new(storage_root)).handle_error(handle_error);
    Router::new()
        .nest("/api", api::app())
        .nest("/storage", serve)
        .layer(Extension(club_service))
        .layer(Extension(event_service))
}

async fn handle_error(_: io::Error) -> error::AppError {
    error::AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch stored file")
}
