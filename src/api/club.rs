use super::{
    form::{LimitedMultipart, MultipartForm},
    parse_id, ActionResponse,
};
use crate::{
    error::AppResult,
    models::ClubWithStudents,
    service::{ClubForm, ClubFormRules, ClubProfile, ClubService},
};
use axum::{
    extract::{ContentLengthLimit, Path},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

const NOT_FOUND: &str = "the club does not exist";

fn club_form(form: &mut MultipartForm) -> ClubForm {
    ClubForm {
        club_name: form.text("club_name"),
        logo: form.file("logo"),
        introduction: form.text("introduction"),
        mission: form.text("mission"),
        staff_coordinator_name: form.text("staff_coordinator_name"),
        staff_coordinator_email: form.text("staff_coordinator_email"),
        staff_coordinator_photo: form.file("staff_coordinator_photo"),
        year_started: form.text("year_started"),
        students: form.students(),
    }
}

async fn list(
    Extension(clubs): Extension<Arc<ClubService>>,
) -> AppResult<Json<Vec<ClubWithStudents>>> {
    Ok(Json(clubs.list().await?))
}

async fn create_form(Extension(clubs): Extension<Arc<ClubService>>) -> Json<ClubFormRules> {
    Json(clubs.create_form())
}

async fn store(
    Extension(clubs): Extension<Arc<ClubService>>,
    ContentLengthLimit(multipart): LimitedMultipart,
) -> AppResult<Json<ActionResponse>> {
    let mut form = MultipartForm::read(multipart).await?;
    let club = clubs.store(club_form(&mut form)).await?;

    Ok(Json(ActionResponse::new(
        "Club added successfully!",
        club.id,
        "/clubs",
    )))
}

async fn edit(
    Extension(clubs): Extension<Arc<ClubService>>,
    Path(id): Path<String>,
) -> AppResult<Json<ClubWithStudents>> {
    Ok(Json(clubs.edit(parse_id(&id, NOT_FOUND)?).await?))
}

async fn update(
    Extension(clubs): Extension<Arc<ClubService>>,
    Path(id): Path<String>,
    ContentLengthLimit(multipart): LimitedMultipart,
) -> AppResult<Json<ActionResponse>> {
    let id = parse_id(&id, NOT_FOUND)?;
    let mut form = MultipartForm::read(multipart).await?;
    let club = clubs.update(id, club_form(&mut form)).await?;

    Ok(Json(ActionResponse::new(
        "Club updated successfully!",
        club.club.id,
        "/clubs",
    )))
}

async fn destroy(
    Extension(clubs): Extension<Arc<ClubService>>,
    Path(id): Path<String>,
) -> AppResult<Json<ActionResponse>> {
    let deleted = clubs.destroy(parse_id(&id, NOT_FOUND)?).await?;

    Ok(Json(ActionResponse::new(
        "Club deleted successfully!",
        deleted.club.id,
        "/clubs",
    )))
}

async fn profile(
    Extension(clubs): Extension<Arc<ClubService>>,
    Path(id): Path<String>,
) -> AppResult<Json<ClubProfile>> {
    Ok(Json(clubs.profile(parse_id(&id, NOT_FOUND)?).await?))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(store))
        .route("/create", get(create_form))
        .route("/:id", post(update).put(update).delete(destroy))
        .route("/:id/edit", get(edit))
        .route("/:id/profile", get(profile))
}
