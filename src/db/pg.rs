use async_trait::async_trait;
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};

use super::{ClubRepository, EventRepository};
use crate::{
    models::{
        Club, ClubUpdate, ClubWithStudents, DeletedClub, Event, NewClub, NewEvent,
        StudentCoordinator,
    },
    schema::*,
    DbPool,
};

/// Both repositories on top of the PostgreSQL pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn load_students(
    conn: &mut AsyncPgConnection,
    clubs: Vec<Club>,
) -> QueryResult<Vec<ClubWithStudents>> {
    let students = StudentCoordinator::belonging_to(&clubs)
        .order(student_coordinators::id.asc())
        .load::<StudentCoordinator>(conn)
        .await?
        .grouped_by(&clubs);

    Ok(clubs
        .into_iter()
        .zip(students)
        .map(|(club, student_coordinators)| ClubWithStudents {
            club,
            student_coordinators,
        })
        .collect())
}

#[async_trait]
impl ClubRepository for PgRepository {
    async fn list_clubs(&self) -> anyhow::Result<Vec<ClubWithStudents>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let clubs = clubs::table
            .order(clubs::id.asc())
            .load::<Club>(conn)
            .await?;

        Ok(load_students(conn, clubs).await?)
    }

    async fn find_club(&self, id: i32) -> anyhow::Result<Option<ClubWithStudents>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let Some(club) = clubs::table
            .find(id)
            .first::<Club>(conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        Ok(load_students(conn, vec![club]).await?.pop())
    }

    async fn club_exists(&self, id: i32) -> anyhow::Result<bool> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(diesel::select(diesel::dsl::exists(clubs::table.find(id)))
            .get_result::<bool>(conn)
            .await?)
    }

    async fn insert_club(&self, club: NewClub) -> anyhow::Result<Club> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(diesel::insert_into(clubs::table)
            .values(&club)
            .get_result::<Club>(conn)
            .await?)
    }

    async fn update_club(&self, update: ClubUpdate) -> anyhow::Result<ClubWithStudents> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let club = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    let club = diesel::update(&update.club)
                        .set(&update.club)
                        .get_result::<Club>(conn)
                        .await?;

                    for student in &update.renamed {
                        diesel::update(student).set(student).execute(conn).await?;
                    }

                    if !update.created.is_empty() {
                        diesel::insert_into(student_coordinators::table)
                            .values(&update.created)
                            .execute(conn)
                            .await?;
                    }

                    load_students(conn, vec![club])
                        .await?
                        .pop()
                        .ok_or(DieselError::NotFound)
                }
                .scope_boxed()
            })
            .await?;

        Ok(club)
    }

    async fn delete_club(&self, id: i32) -> anyhow::Result<Option<DeletedClub>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let deleted = conn
            .transaction::<_, DieselError, _>(|conn| {
                async move {
                    let events = diesel::delete(events::table.filter(events::club_id.eq(id)))
                        .get_results::<Event>(conn)
                        .await?;
                    let student_coordinators = diesel::delete(
                        student_coordinators::table.filter(student_coordinators::club_id.eq(id)),
                    )
                    .get_results::<StudentCoordinator>(conn)
                    .await?;
                    let club = diesel::delete(clubs::table.find(id))
                        .get_result::<Club>(conn)
                        .await
                        .optional()?;

                    Ok(club.map(|club| DeletedClub {
                        club,
                        student_coordinators,
                        events,
                    }))
                }
                .scope_boxed()
            })
            .await?;

        Ok(deleted)
    }
}

#[async_trait]
impl EventRepository for PgRepository {
    async fn find_event(&self, id: i32) -> anyhow::Result<Option<Event>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(events::table
            .find(id)
            .first::<Event>(conn)
            .await
            .optional()?)
    }

    async fn events_for_club(&self, club_id: i32) -> anyhow::Result<Vec<Event>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(events::table
            .filter(events::club_id.eq(club_id))
            .order((events::date.asc(), events::time.asc(), events::id.asc()))
            .load::<Event>(conn)
            .await?)
    }

    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        match diesel::insert_into(events::table)
            .values(&event)
            .get_result::<Event>(conn)
            .await
        {
            Ok(event) => Ok(Some(event)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_event(&self, event: Event) -> anyhow::Result<Event> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(diesel::update(&event)
            .set(&event)
            .get_result::<Event>(conn)
            .await?)
    }

    async fn delete_event(&self, id: i32) -> anyhow::Result<Option<Event>> {
        let mut pooled = self.pool.get().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        Ok(diesel::delete(events::table.find(id))
            .get_result::<Event>(conn)
            .await
            .optional()?)
    }
}
