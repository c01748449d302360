use std::sync::Arc;

use crate::{
    db::{ClubRepository, EventRepository},
    error::{AppError, AppResult},
    models::{Event, NewEvent},
    storage::{discard, BlobStorage, StagedBlobs, EVENT_IMAGES},
    upload::{UploadedFile, EVENT_IMAGE},
    validate::{ValidationErrors, Validator},
};

/// Submitted event fields. Text is already trimmed, blank values are `None`.
#[derive(Debug, Default, Clone)]
pub struct EventForm {
    /// Ignored by updates, an event never moves to another club.
    pub club_id: Option<String>,
    pub event_name: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub image: Option<UploadedFile>,
}

const INVALID_CLUB: &str = "The selected club id is invalid.";

pub struct EventService {
    clubs: Arc<dyn ClubRepository>,
    events: Arc<dyn EventRepository>,
    storage: Arc<dyn BlobStorage>,
}

impl EventService {
    pub fn new(
        clubs: Arc<dyn ClubRepository>,
        events: Arc<dyn EventRepository>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            clubs,
            events,
            storage,
        }
    }

    pub async fn store(&self, form: EventForm) -> AppResult<Event> {
        let mut v = Validator::new();
        let club_id = v.required_integer("club_id", form.club_id);
        if let Some(club_id) = club_id {
            if !self.clubs.club_exists(club_id).await? {
                v.fail("club_id", INVALID_CLUB);
            }
        }
        let event_name = v.required_string("event_name", form.event_name, Some(255));
        let description = v.optional_string("description", form.description, None);
        let date = v.required_date("date", form.date);
        let time = v.required_time("time", form.time);
        let image = v.optional_image("image", form.image, &EVENT_IMAGE);
        v.finish()?;

        let (Some(club_id), Some(event_name), Some(date), Some(time)) =
            (club_id, event_name, date, time)
        else {
            return Err(anyhow::anyhow!("validated event form lost a required field").into());
        };

        let mut staged = StagedBlobs::new(self.storage.as_ref());
        let result = async {
            let image_path = match &image {
                Some(image) => Some(staged.store(EVENT_IMAGES, image).await?),
                None => None,
            };

            let inserted = self
                .events
                .insert_event(NewEvent {
                    club_id,
                    event_name,
                    description,
                    date,
                    time,
                    image_path,
                })
                .await?;

            // the club vanished after it was validated
            let event = inserted.ok_or_else(|| {
                let mut errors = ValidationErrors::default();
                errors.add("club_id", INVALID_CLUB);
                AppError::ValidationError(errors)
            })?;
            Ok::<_, AppError>(event)
        }
        .await;

        match result {
            Ok(event) => {
                tracing::info!(event_id = event.id, club_id, "added event");
                Ok(event)
            }
            Err(e) => {
                staged.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn edit(&self, id: i32) -> AppResult<Event> {
        self.events
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::not_found("the event does not exist"))
    }

    pub async fn update(&self, id: i32, form: EventForm) -> AppResult<Event> {
        let mut event = self.edit(id).await?;

        let mut v = Validator::new();
        let event_name = v.required_string("event_name", form.event_name, Some(255));
        let description = v.optional_string("description", form.description, None);
        let date = v.required_date("date", form.date);
        let time = v.required_time("time", form.time);
        let image = v.optional_image("image", form.image, &EVENT_IMAGE);
        v.finish()?;

        let (Some(event_name), Some(date), Some(time)) = (event_name, date, time) else {
            return Err(anyhow::anyhow!("validated event form lost a required field").into());
        };

        let unchanged = image.is_none()
            && event.event_name == event_name
            && event.description == description
            && event.date == date
            && event.time == time;
        if unchanged {
            return Ok(event);
        }

        event.event_name = event_name;
        event.description = description;
        event.date = date;
        event.time = time;
        event.updated_at = super::now();

        let mut obsolete = None;
        let mut staged = StagedBlobs::new(self.storage.as_ref());
        let result = async {
            if let Some(image) = &image {
                let path = staged.store(EVENT_IMAGES, image).await?;
                obsolete = event.image_path.replace(path);
            }
            let saved = self.events.save_event(event).await?;
            Ok::<_, AppError>(saved)
        }
        .await;

        match result {
            Ok(event) => {
                discard(self.storage.as_ref(), obsolete).await;
                tracing::info!(event_id = id, "updated event");
                Ok(event)
            }
            Err(e) => {
                staged.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn destroy(&self, id: i32) -> AppResult<Event> {
        let event = self
            .events
            .delete_event(id)
            .await?
            .ok_or_else(|| AppError::not_found("the event does not exist"))?;

        if let Some(path) = &event.image_path {
            if self.storage.exists(path).await.unwrap_or(false) {
                discard(self.storage.as_ref(), [path.clone()]).await;
            }
        }
        tracing::info!(event_id = id, club_id = event.club_id, "deleted event");
        Ok(event)
    }
}
