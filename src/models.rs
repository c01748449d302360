use crate::schema::*;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, AsChangeset, Serialize)]
#[diesel(table_name = clubs)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: i32,
    pub club_name: String,
    pub logo: String,
    pub introduction: Option<String>,
    pub mission: Option<String>,
    pub staff_coordinator_name: Option<String>,
    pub staff_coordinator_email: Option<String>,
    pub staff_coordinator_photo: Option<String>,
    pub year_started: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = clubs)]
pub struct NewClub {
    pub club_name: String,
    pub logo: String,
    pub introduction: Option<String>,
    pub mission: Option<String>,
    pub staff_coordinator_name: Option<String>,
    pub staff_coordinator_email: Option<String>,
    pub staff_coordinator_photo: Option<String>,
    pub year_started: Option<i32>,
}

#[derive(
    Debug, Clone, PartialEq, Queryable, Identifiable, Associations, AsChangeset, Serialize,
)]
#[diesel(belongs_to(Club))]
#[diesel(table_name = student_coordinators)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct StudentCoordinator {
    pub id: i32,
    pub club_id: i32,
    pub name: String,
    pub photo: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = student_coordinators)]
pub struct NewStudentCoordinator {
    pub club_id: i32,
    pub name: String,
    pub photo: Option<String>,
}

#[derive(
    Debug, Clone, PartialEq, Queryable, Identifiable, Associations, AsChangeset, Serialize,
)]
#[diesel(belongs_to(Club))]
#[diesel(table_name = events)]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i32,
    pub club_id: i32,
    pub event_name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub image_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub club_id: i32,
    pub event_name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub image_path: Option<String>,
}

/// A club with its student coordinators loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubWithStudents {
    #[serde(flatten)]
    pub club: Club,
    pub student_coordinators: Vec<StudentCoordinator>,
}

/// Changes of one club update, committed together.
#[derive(Debug, Clone, PartialEq)]
pub struct ClubUpdate {
    pub club: Club,
    pub renamed: Vec<StudentCoordinator>,
    pub created: Vec<NewStudentCoordinator>,
}

/// Rows removed by a club deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedClub {
    pub club: Club,
    pub student_coordinators: Vec<StudentCoordinator>,
    pub events: Vec<Event>,
}

impl DeletedClub {
    /// Every blob path the deleted rows referenced.
    pub fn blob_paths(&self) -> Vec<String> {
        let club = &self.club;
        std::iter::once(club.logo.clone())
            .chain(club.staff_coordinator_photo.clone())
            .chain(
                self.student_coordinators
                    .iter()
                    .filter_map(|s| s.photo.clone()),
            )
            .chain(self.events.iter().filter_map(|e| e.image_path.clone()))
            .collect()
    }
}
