// Library exports for bandhan
// This allows integration tests and the binary to share the same modules

pub mod attachments;
pub mod auth;
pub mod config;
pub mod connections;
pub mod conversations;
pub mod db;
pub mod error;
pub mod extractors;
pub mod ids;
pub mod messages;
pub mod profiles;
pub mod realtime;
pub mod routes;
pub mod state;
