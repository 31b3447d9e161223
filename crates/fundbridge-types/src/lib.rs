pub mod api;
pub mod metadata;
pub mod models;
