pub mod apperror;
pub mod config;
pub mod geo;
pub mod models;
pub mod sample;
