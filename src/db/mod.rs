use async_trait::async_trait;

use crate::models::{Club, ClubUpdate, ClubWithStudents, DeletedClub, Event, NewClub, NewEvent};

mod pg;

pub use pg::PgRepository;

#[async_trait]
pub trait ClubRepository: Send + Sync {
    /// All clubs ordered by id, coordinators ordered by id.
    async fn list_clubs(&self) -> anyhow::Result<Vec<ClubWithStudents>>;

    async fn find_club(&self, id: i32) -> anyhow::Result<Option<ClubWithStudents>>;

    async fn club_exists(&self, id: i32) -> anyhow::Result<bool>;

    async fn insert_club(&self, club: NewClub) -> anyhow::Result<Club>;

    /// Applies the club row, coordinator renames and inserts atomically.
    async fn update_club(&self, update: ClubUpdate) -> anyhow::Result<ClubWithStudents>;

    /// Removes the club with its coordinators and events atomically.
    /// `None` when no such club exists.
    async fn delete_club(&self, id: i32) -> anyhow::Result<Option<DeletedClub>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_event(&self, id: i32) -> anyhow::Result<Option<Event>>;

    /// Events of a club ordered by date and time.
    async fn events_for_club(&self, club_id: i32) -> anyhow::Result<Vec<Event>>;

    /// `None` when `event.club_id` does not reference a club.
    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>>;

    async fn save_event(&self, event: Event) -> anyhow::Result<Event>;

    async fn delete_event(&self, id: i32) -> anyhow::Result<Option<Event>>;
}
