pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod expenses;
pub mod ids;
pub mod model;
pub mod state;
pub mod store;
pub mod validation;
