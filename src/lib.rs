// Public API for integration tests and the server binary

pub mod api;
pub mod auth;
pub mod email;
pub mod game;
pub mod reset;
pub mod state;
pub mod store;
pub mod types;
