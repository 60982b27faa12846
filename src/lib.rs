pub mod api;
pub mod auth;
pub mod color;
pub mod config;
pub mod models;
pub mod ordering;
pub mod public;
pub mod storage;
