// Public API for integration tests and the server binary

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod music;
pub mod protocol;
pub mod scheduler;
pub mod state;
pub mod types;
pub mod words;
