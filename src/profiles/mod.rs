pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{Gender, Mode, Profile, ProfileError, ProfileImage, ProfileInput};
pub use repository::{DynProfileRepository, ProfileRepository, SqliteProfileRepository};
pub use service::{BookmarkOutcome, ProfileService};
