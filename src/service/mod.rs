pub mod club;
pub mod event;

pub use club::{ClubForm, ClubFormRules, ClubProfile, ClubService, StudentCoordinatorInput};
pub use event::{EventForm, EventService};

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
