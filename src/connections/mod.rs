pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{ConnectionError, ConnectionRequest, Decision, RequestRole, RequestStatus};
pub use repository::{
    ConnectionRepository, DynConnectionRepository, SqliteConnectionRepository,
};
pub use service::{ConnectionService, StatusOutcome};
