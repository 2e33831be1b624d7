pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod keepalive;
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod storage;
pub mod upload; // multipart buffering

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
