use axum::Router;
use serde::Serialize;
use std::borrow::Cow;

use crate::error::{AppError, AppResult};

pub mod club;
pub mod event;
pub mod form;

/// Answer of every successful mutation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message: Cow<'static, str>,
    pub id: i32,
    /// Page the client should show next.
    pub redirect: String,
}

impl ActionResponse {
    fn new(message: &'static str, id: i32, redirect: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id,
            redirect: redirect.into(),
        }
    }
}

/// Ids that are not numbers name no record.
fn parse_id(id: &str, not_found: &'static str) -> AppResult<i32> {
    id.parse().map_err(|_| AppError::not_found(not_found))
}

pub fn app() -> Router {
    Router::new()
        .nest("/clubs", club::app())
        .nest("/events", event::app())
}
