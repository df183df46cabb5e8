pub mod chat;
pub mod events;
pub mod middleware;
pub mod profile;
pub mod protocol;
pub mod rest;
pub mod sessions;
pub mod state;

// Re-export the router builder so the binary can assemble the server.
pub use middleware::require_user;
pub use rest::{router, ApiDoc};
