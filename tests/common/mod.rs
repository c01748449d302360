#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use club_directory::{
    db::{ClubRepository, EventRepository},
    models::{
        Club, ClubUpdate, ClubWithStudents, DeletedClub, Event, NewClub, NewEvent,
        StudentCoordinator,
    },
    service::{ClubForm, ClubService, EventForm, EventService},
    storage::{BlobStorage, LocalStorage},
    upload::UploadedFile,
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};
use tempfile::TempDir;

#[derive(Default)]
struct Tables {
    clubs: Vec<Club>,
    students: Vec<StudentCoordinator>,
    events: Vec<Event>,
}

fn next_id<T>(rows: &[T], id: impl Fn(&T) -> i32) -> i32 {
    rows.iter().map(id).max().unwrap_or(0) + 1
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Both repositories backed by vectors. Every call holds the lock for its
/// whole duration, which makes multi-row writes atomic.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryRepository {
    /// Makes every following club update and event save fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("simulated database outage");
        }
        Ok(())
    }

    pub fn seed_student(
        &self,
        club_id: i32,
        id: i32,
        name: &str,
        photo: Option<String>,
    ) -> StudentCoordinator {
        let student = StudentCoordinator {
            id,
            club_id,
            name: name.to_string(),
            photo,
            created_at: now(),
            updated_at: now(),
        };
        self.tables.write().unwrap().students.push(student.clone());
        student
    }

    pub fn club(&self, id: i32) -> Option<Club> {
        let tables = self.tables.read().unwrap();
        tables.clubs.iter().find(|c| c.id == id).cloned()
    }

    pub fn students_of(&self, club_id: i32) -> Vec<StudentCoordinator> {
        let tables = self.tables.read().unwrap();
        let mut students: Vec<_> = tables
            .students
            .iter()
            .filter(|s| s.club_id == club_id)
            .cloned()
            .collect();
        students.sort_by_key(|s| s.id);
        students
    }

    pub fn event(&self, id: i32) -> Option<Event> {
        let tables = self.tables.read().unwrap();
        tables.events.iter().find(|e| e.id == id).cloned()
    }

    pub fn event_count(&self) -> usize {
        self.tables.read().unwrap().events.len()
    }

    fn with_students(tables: &Tables, club: Club) -> ClubWithStudents {
        let mut student_coordinators: Vec<_> = tables
            .students
            .iter()
            .filter(|s| s.club_id == club.id)
            .cloned()
            .collect();
        student_coordinators.sort_by_key(|s| s.id);
        ClubWithStudents {
            club,
            student_coordinators,
        }
    }
}

#[async_trait]
impl ClubRepository for MemoryRepository {
    async fn list_clubs(&self) -> anyhow::Result<Vec<ClubWithStudents>> {
        let tables = self.tables.read().unwrap();
        let mut clubs = tables.clubs.clone();
        clubs.sort_by_key(|c| c.id);
        Ok(clubs
            .into_iter()
            .map(|club| Self::with_students(&tables, club))
            .collect())
    }

    async fn find_club(&self, id: i32) -> anyhow::Result<Option<ClubWithStudents>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .clubs
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(|club| Self::with_students(&tables, club)))
    }

    async fn club_exists(&self, id: i32) -> anyhow::Result<bool> {
        Ok(self.club(id).is_some())
    }

    async fn insert_club(&self, club: NewClub) -> anyhow::Result<Club> {
        let mut tables = self.tables.write().unwrap();
        let club = Club {
            id: next_id(&tables.clubs, |c| c.id),
            club_name: club.club_name,
            logo: club.logo,
            introduction: club.introduction,
            mission: club.mission,
            staff_coordinator_name: club.staff_coordinator_name,
            staff_coordinator_email: club.staff_coordinator_email,
            staff_coordinator_photo: club.staff_coordinator_photo,
            year_started: club.year_started,
            created_at: now(),
            updated_at: now(),
        };
        tables.clubs.push(club.clone());
        Ok(club)
    }

    async fn update_club(&self, update: ClubUpdate) -> anyhow::Result<ClubWithStudents> {
        self.check_writes()?;
        let mut tables = self.tables.write().unwrap();

        let Some(row) = tables.clubs.iter_mut().find(|c| c.id == update.club.id) else {
            anyhow::bail!("club {} vanished", update.club.id);
        };
        *row = update.club.clone();

        for student in update.renamed {
            if let Some(row) = tables.students.iter_mut().find(|s| s.id == student.id) {
                *row = student;
            }
        }
        for new in update.created {
            let student = StudentCoordinator {
                id: next_id(&tables.students, |s| s.id),
                club_id: new.club_id,
                name: new.name,
                photo: new.photo,
                created_at: now(),
                updated_at: now(),
            };
            tables.students.push(student);
        }

        Ok(Self::with_students(&tables, update.club))
    }

    async fn delete_club(&self, id: i32) -> anyhow::Result<Option<DeletedClub>> {
        let mut tables = self.tables.write().unwrap();
        let Some(index) = tables.clubs.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let club = tables.clubs.remove(index);
        let (student_coordinators, students): (Vec<_>, Vec<_>) =
            tables.students.drain(..).partition(|s| s.club_id == id);
        tables.students = students;
        let (events, kept): (Vec<_>, Vec<_>) =
            tables.events.drain(..).partition(|e| e.club_id == id);
        tables.events = kept;

        Ok(Some(DeletedClub {
            club,
            student_coordinators,
            events,
        }))
    }
}

#[async_trait]
impl EventRepository for MemoryRepository {
    async fn find_event(&self, id: i32) -> anyhow::Result<Option<Event>> {
        Ok(self.event(id))
    }

    async fn events_for_club(&self, club_id: i32) -> anyhow::Result<Vec<Event>> {
        let tables = self.tables.read().unwrap();
        let mut events: Vec<_> = tables
            .events
            .iter()
            .filter(|e| e.club_id == club_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.time, e.id));
        Ok(events)
    }

    async fn insert_event(&self, event: NewEvent) -> anyhow::Result<Option<Event>> {
        let mut tables = self.tables.write().unwrap();
        if !tables.clubs.iter().any(|c| c.id == event.club_id) {
            return Ok(None);
        }
        let event = Event {
            id: next_id(&tables.events, |e| e.id),
            club_id: event.club_id,
            event_name: event.event_name,
            description: event.description,
            date: event.date,
            time: event.time,
            image_path: event.image_path,
            created_at: now(),
            updated_at: now(),
        };
        tables.events.push(event.clone());
        Ok(Some(event))
    }

    async fn save_event(&self, event: Event) -> anyhow::Result<Event> {
        self.check_writes()?;
        let mut tables = self.tables.write().unwrap();
        let Some(row) = tables.events.iter_mut().find(|e| e.id == event.id) else {
            anyhow::bail!("event {} vanished", event.id);
        };
        *row = event.clone();
        Ok(event)
    }

    async fn delete_event(&self, id: i32) -> anyhow::Result<Option<Event>> {
        let mut tables = self.tables.write().unwrap();
        let Some(index) = tables.events.iter().position(|e| e.id == id) else {
            return Ok(None);
        };
        Ok(Some(tables.events.remove(index)))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub repo: Arc<MemoryRepository>,
    pub storage: Arc<LocalStorage>,
    pub clubs: ClubService,
    pub events: EventService,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(MemoryRepository::default());
        let storage = Arc::new(LocalStorage::new(dir.path()));
        let clubs = ClubService::new(repo.clone(), repo.clone(), storage.clone());
        let events = EventService::new(repo.clone(), repo.clone(), storage.clone());
        Self {
            dir,
            repo,
            storage,
            clubs,
            events,
        }
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.storage.exists(path).await.unwrap()
    }

    pub async fn read(&self, path: &str) -> Vec<u8> {
        self.storage.read(path).await.unwrap()
    }

    /// Number of files anywhere below the storage root.
    pub fn blob_count(&self) -> usize {
        count_files(self.dir.path())
    }

    pub async fn seed_club(&self, name: &str) -> Club {
        self.clubs.store(club_form(name)).await.unwrap()
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// A PNG signature followed by `tag`, so every fixture has distinct bytes.
pub fn png(tag: &str) -> UploadedFile {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    UploadedFile::new(format!("{tag}.png"), bytes)
}

pub fn gif(tag: &str) -> UploadedFile {
    let mut bytes = b"GIF89a".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    UploadedFile::new(format!("{tag}.gif"), bytes)
}

pub fn club_form(name: &str) -> ClubForm {
    ClubForm {
        club_name: Some(name.to_string()),
        logo: Some(png(&format!("{name}-logo"))),
        introduction: Some("We meet on Fridays.".to_string()),
        mission: Some("Have fun.".to_string()),
        staff_coordinator_name: Some("Ms. Rivera".to_string()),
        staff_coordinator_email: Some("rivera@school.edu".to_string()),
        staff_coordinator_photo: None,
        year_started: Some("2015".to_string()),
        students: Vec::new(),
    }
}

/// The required fields of a club update without any new file.
pub fn update_form(name: &str) -> ClubForm {
    ClubForm {
        club_name: Some(name.to_string()),
        staff_coordinator_email: Some("rivera@school.edu".to_string()),
        year_started: Some("2016".to_string()),
        ..ClubForm::default()
    }
}

pub fn event_form(club_id: i32) -> EventForm {
    EventForm {
        club_id: Some(club_id.to_string()),
        event_name: Some("Spring Tournament".to_string()),
        description: Some("Bring your own board.".to_string()),
        date: Some("2025-04-12".to_string()),
        time: Some("15:30".to_string()),
        image: None,
    }
}

/// Builds a `multipart/form-data` body; returns the content type and bytes.
pub fn multipart(
    texts: &[(&str, &str)],
    files: &[(&str, &UploadedFile)],
) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "club-directory-test-boundary";
    let mut body = Vec::new();

    for (name, value) in texts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file) in files {
        let file_name = file.file_name.clone().unwrap_or_default();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
