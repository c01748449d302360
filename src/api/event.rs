use super::{
    form::{LimitedMultipart, MultipartForm},
    parse_id, ActionResponse,
};
use crate::{
    error::AppResult,
    models::Event,
    service::{EventForm, EventService},
};
use axum::{
    extract::{ContentLengthLimit, Path},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

const NOT_FOUND: &str = "the event does not exist";

fn event_form(form: &mut MultipartForm) -> EventForm {
    EventForm {
        club_id: form.text("club_id"),
        event_name: form.text("event_name"),
        description: form.text("description"),
        date: form.text("date"),
        time: form.text("time"),
        image: form.file("image"),
    }
}

fn profile_page(club_id: i32) -> String {
    format!("/clubs/{club_id}/profile")
}

async fn store(
    Extension(events): Extension<Arc<EventService>>,
    ContentLengthLimit(multipart): LimitedMultipart,
) -> AppResult<Json<ActionResponse>> {
    let mut form = MultipartForm::read(multipart).await?;
    let event = events.store(event_form(&mut form)).await?;

    Ok(Json(ActionResponse::new(
        "Event added successfully!",
        event.id,
        profile_page(event.club_id),
    )))
}

async fn edit(
    Extension(events): Extension<Arc<EventService>>,
    Path(id): Path<String>,
) -> AppResult<Json<Event>> {
    Ok(Json(events.edit(parse_id(&id, NOT_FOUND)?).await?))
}

async fn update(
    Extension(events): Extension<Arc<EventService>>,
    Path(id): Path<String>,
    ContentLengthLimit(multipart): LimitedMultipart,
) -> AppResult<Json<ActionResponse>> {
    let id = parse_id(&id, NOT_FOUND)?;
    let mut form = MultipartForm::read(multipart).await?;
    let event = events.update(id, event_form(&mut form)).await?;

    Ok(Json(ActionResponse::new(
        "Event updated successfully!",
        event.id,
        profile_page(event.club_id),
    )))
}

async fn destroy(
    Extension(events): Extension<Arc<EventService>>,
    Path(id): Path<String>,
) -> AppResult<Json<ActionResponse>> {
    let event = events.destroy(parse_id(&id, NOT_FOUND)?).await?;

    Ok(Json(ActionResponse::new(
        "Event deleted successfully!",
        event.id,
        profile_page(event.club_id),
    )))
}

pub fn app() -> Router {
    Router::new()
        .route("/", post(store))
        .route("/:id", post(update).put(update).delete(destroy))
        .route("/:id/edit", get(edit))
}
