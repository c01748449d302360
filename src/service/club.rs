use serde::Serialize;
use std::{collections::HashSet, sync::Arc};

use crate::{
    db::{ClubRepository, EventRepository},
    error::{AppError, AppResult},
    models::{
        Club, ClubUpdate, ClubWithStudents, DeletedClub, Event, NewClub, NewStudentCoordinator,
        StudentCoordinator,
    },
    storage::{discard, BlobStorage, StagedBlobs, CLUB_LOGOS, STAFF_PHOTOS, STUDENT_PHOTOS},
    upload::{RuleSummary, UploadedFile, CLUB_IMAGE, REPLACEMENT_IMAGE},
    validate::Validator,
};

/// Submitted club fields. Text is already trimmed, blank values are `None`.
#[derive(Debug, Default, Clone)]
pub struct ClubForm {
    pub club_name: Option<String>,
    pub logo: Option<UploadedFile>,
    pub introduction: Option<String>,
    pub mission: Option<String>,
    pub staff_coordinator_name: Option<String>,
    pub staff_coordinator_email: Option<String>,
    pub staff_coordinator_photo: Option<UploadedFile>,
    pub year_started: Option<String>,
    /// Only read by updates.
    pub students: Vec<StudentCoordinatorInput>,
}

/// One entry of the ordered student coordinator list of an update.
#[derive(Debug, Default, Clone)]
pub struct StudentCoordinatorInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub photo: Option<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubFormRules {
    pub logo: RuleSummary,
    pub staff_coordinator_photo: RuleSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubProfile {
    #[serde(flatten)]
    pub club: ClubWithStudents,
    pub events: Vec<Event>,
}

#[derive(Debug)]
enum StudentChange {
    Rename {
        student: StudentCoordinator,
        photo: Option<UploadedFile>,
    },
    Create {
        name: String,
        photo: Option<UploadedFile>,
    },
}

/// Validates the student list against the club's current coordinators.
/// Entries without id and name are dropped.
fn plan_students(
    v: &mut Validator,
    existing: &[StudentCoordinator],
    inputs: Vec<StudentCoordinatorInput>,
) -> Vec<StudentChange> {
    let mut seen = HashSet::new();
    let mut changes = Vec::new();

    for (i, input) in inputs.into_iter().enumerate() {
        let id_field = format!("students.{i}.id");
        let name_field = format!("students.{i}.name");
        let photo_field = format!("students.{i}.photo");

        let id = v.optional_integer(&id_field, input.id);
        let name = v.optional_string(&name_field, input.name, Some(255));
        let photo = v.optional_image(&photo_field, input.photo, &REPLACEMENT_IMAGE);
        if v.has_error(&id_field) {
            continue;
        }

        let Some(id) = id else {
            if let Some(name) = name {
                changes.push(StudentChange::Create { name, photo });
            }
            continue;
        };

        let Some(current) = existing.iter().find(|s| s.id == id) else {
            v.fail(&id_field, format!("The selected {id_field} is invalid."));
            continue;
        };
        if !seen.insert(id) {
            v.fail(&id_field, format!("The {id_field} field has a duplicate value."));
            continue;
        }
        let Some(name) = name else {
            if !v.has_error(&name_field) {
                v.fail(
                    &name_field,
                    format!("The {name_field} field is required when {id_field} is present."),
                );
            }
            continue;
        };

        let mut student = current.clone();
        student.name = name;
        changes.push(StudentChange::Rename { student, photo });
    }

    changes
}

pub struct ClubService {
    clubs: Arc<dyn ClubRepository>,
    events: Arc<dyn EventRepository>,
    storage: Arc<dyn BlobStorage>,
}

impl ClubService {
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

    pub async fn list(&self) -> AppResult<Vec<ClubWithStudents>> {
        Ok(self.clubs.list_clubs().await?)
    }

    pub fn create_form(&self) -> ClubFormRules {
        ClubFormRules {
            logo: CLUB_IMAGE.summary(true),
            staff_coordinator_photo: CLUB_IMAGE.summary(false),
        }
    }

    pub async fn edit(&self, id: i32) -> AppResult<ClubWithStudents> {
        self.find(id).await
    }

    pub async fn profile(&self, id: i32) -> AppResult<ClubProfile> {
        let club = self.find(id).await?;
        let events = self.events.events_for_club(id).await?;
        Ok(ClubProfile { club, events })
    }

    async fn find(&self, id: i32) -> AppResult<ClubWithStudents> {
        self.clubs
            .find_club(id)
            .await?
            .ok_or_else(|| AppError::not_found("the club does not exist"))
    }

    pub async fn store(&self, form: ClubForm) -> AppResult<Club> {
        let mut v = Validator::new();
        let club_name = v.required_string("club_name", form.club_name, Some(255));
        let logo = v.required_image("logo", form.logo, &CLUB_IMAGE);
        let introduction = v.optional_string("introduction", form.introduction, None);
        let mission = v.optional_string("mission", form.mission, None);
        let staff_coordinator_name =
            v.optional_string("staff_coordinator_name", form.staff_coordinator_name, Some(255));
        let staff_coordinator_email = v.optional_email(
            "staff_coordinator_email",
            form.staff_coordinator_email,
            Some(255),
        );
        let staff_photo = v.optional_image(
            "staff_coordinator_photo",
            form.staff_coordinator_photo,
            &CLUB_IMAGE,
        );
        let year_started = v.optional_integer("year_started", form.year_started);
        v.finish()?;

        let (Some(club_name), Some(logo)) = (club_name, logo) else {
            return Err(anyhow::anyhow!("validated club form lost its name or logo").into());
        };

        let mut staged = StagedBlobs::new(self.storage.as_ref());
        let result = async {
            let logo = staged.store(CLUB_LOGOS, &logo).await?;
            let staff_coordinator_photo = match &staff_photo {
                Some(photo) => Some(staged.store(STAFF_PHOTOS, photo).await?),
                None => None,
            };

            let club = self
                .clubs
                .insert_club(NewClub {
                    club_name,
                    logo,
                    introduction,
                    mission,
                    staff_coordinator_name,
                    staff_coordinator_email,
                    staff_coordinator_photo,
                    year_started,
                })
                .await?;
            Ok::<_, AppError>(club)
        }
        .await;

        match result {
            Ok(club) => {
                tracing::info!(club_id = club.id, "added club");
                Ok(club)
            }
            Err(e) => {
                staged.rollback().await;
                Err(e)
            }
        }
    }

    pub async fn update(&self, id: i32, form: ClubForm) -> AppResult<ClubWithStudents> {
        let existing = self.find(id).await?;

        let mut v = Validator::new();
        let club_name = v.required_string("club_name", form.club_name, Some(255));
        let introduction = v.optional_string("introduction", form.introduction, None);
        let mission = v.optional_string("mission", form.mission, None);
        let staff_coordinator_name =
            v.optional_string("staff_coordinator_name", form.staff_coordinator_name, Some(255));
        let staff_coordinator_email = v.required_email(
            "staff_coordinator_email",
            form.staff_coordinator_email,
            Some(255),
        );
        let year_started = v.required_integer("year_started", form.year_started);
        let logo = v.optional_image("logo", form.logo, &REPLACEMENT_IMAGE);
        let staff_photo = v.optional_image(
            "staff_coordinator_photo",
            form.staff_coordinator_photo,
            &REPLACEMENT_IMAGE,
        );
        let changes = plan_students(&mut v, &existing.student_coordinators, form.students);
        v.finish()?;

        let (Some(club_name), Some(staff_coordinator_email), Some(year_started)) =
            (club_name, staff_coordinator_email, year_started)
        else {
            return Err(anyhow::anyhow!("validated club form lost a required field").into());
        };

        let now = super::now();
        let mut club = existing.club;
        club.club_name = club_name;
        club.introduction = introduction;
        club.mission = mission;
        club.staff_coordinator_name = staff_coordinator_name;
        club.staff_coordinator_email = Some(staff_coordinator_email);
        club.year_started = Some(year_started);
        club.updated_at = now;

        let mut obsolete = Vec::new();
        let mut staged = StagedBlobs::new(self.storage.as_ref());
        let result = async {
            if let Some(logo) = &logo {
                let path = staged.store(CLUB_LOGOS, logo).await?;
                obsolete.push(std::mem::replace(&mut club.logo, path));
            }
            if let Some(photo) = &staff_photo {
                let path = staged.store(STAFF_PHOTOS, photo).await?;
                obsolete.extend(club.staff_coordinator_photo.replace(path));
            }

            let mut renamed = Vec::new();
            let mut created = Vec::new();
            for change in changes {
                match change {
                    StudentChange::Rename {
                        mut student,
                        photo,
                    } => {
                        if let Some(photo) = &photo {
                            let path = staged.store(STUDENT_PHOTOS, photo).await?;
                            obsolete.extend(student.photo.replace(path));
                        }
                        student.updated_at = now;
                        renamed.push(student);
                    }
                    StudentChange::Create { name, photo } => {
                        let photo = match &photo {
                            Some(photo) => Some(staged.store(STUDENT_PHOTOS, photo).await?),
                            None => None,
                        };
                        created.push(NewStudentCoordinator {
                            club_id: id,
                            name,
                            photo,
                        });
                    }
                }
            }

            let updated = self
                .clubs
                .update_club(ClubUpdate {
                    club,
                    renamed,
                    created,
                })
                .await?;
            Ok::<_, AppError>(updated)
        }
        .await;

        match result {
            Ok(updated) => {
                discard(self.storage.as_ref(), obsolete).await;
                tracing::info!(
                    club_id = id,
                    student_coordinators = updated.student_coordinators.len(),
                    "updated club"
                );
                Ok(updated)
            }
            Err(e) => {
                staged.rollback().await;
                Err(e)
            }
        }
    }

    /// Deletes the club together with its coordinators and events, then
    /// every blob they referenced.
    pub async fn destroy(&self, id: i32) -> AppResult<DeletedClub> {
        let deleted = self
            .clubs
            .delete_club(id)
            .await?
            .ok_or_else(|| AppError::not_found("the club does not exist"))?;

        discard(self.storage.as_ref(), deleted.blob_paths()).await;
        tracing::info!(
            club_id = id,
            student_coordinators = deleted.student_coordinators.len(),
            events = deleted.events.len(),
            "deleted club"
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn student(id: i32, name: &str) -> StudentCoordinator {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        StudentCoordinator {
            id,
            club_id: 1,
            name: name.to_string(),
            photo: Some(format!("student_photos/{id}.png")),
            created_at: at,
            updated_at: at,
        }
    }

    fn input(id: Option<&str>, name: Option<&str>) -> StudentCoordinatorInput {
        StudentCoordinatorInput {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            photo: None,
        }
    }

    #[test]
    fn renames_known_ids_and_creates_named_entries() {
        let existing = [student(5, "Bea")];
        let mut v = Validator::new();
        let changes = plan_students(
            &mut v,
            &existing,
            vec![
                input(None, Some("Alice")),
                input(Some("5"), Some("Bob")),
                input(None, None),
            ],
        );
        assert!(v.finish().is_ok());
        assert_eq!(changes.len(), 2);

        let StudentChange::Create { name, photo } = &changes[0] else {
            panic!("expected a new coordinator, got {:?}", changes[0]);
        };
        assert_eq!(name, "Alice");
        assert!(photo.is_none());

        let StudentChange::Rename { student, photo } = &changes[1] else {
            panic!("expected a rename, got {:?}", changes[1]);
        };
        assert_eq!(student.id, 5);
        assert_eq!(student.name, "Bob");
        assert_eq!(student.photo.as_deref(), Some("student_photos/5.png"));
        assert!(photo.is_none());
    }

    #[test]
    fn rejects_foreign_duplicate_and_nameless_ids() {
        let existing = [student(5, "Bea"), student(6, "Cy")];
        let mut v = Validator::new();
        plan_students(
            &mut v,
            &existing,
            vec![
                input(Some("99"), Some("Ghost")),
                input(Some("5"), Some("Bob")),
                input(Some("5"), Some("Bob again")),
                input(Some("6"), None),
                input(Some("six"), Some("Cy")),
            ],
        );

        let Err(AppError::ValidationError(errors)) = v.finish() else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors.get("students.0.id"),
            Some(&["The selected students.0.id is invalid.".to_string()][..])
        );
        assert!(!errors.contains("students.1.id"));
        assert!(errors.contains("students.2.id"));
        assert!(errors.contains("students.3.name"));
        assert_eq!(
            errors.get("students.4.id"),
            Some(&["The students.4.id must be an integer.".to_string()][..])
        );
    }
}
