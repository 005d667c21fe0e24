pub mod bot;
pub mod config;
pub mod db;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod reminders;
pub mod store;
pub mod templates_structs;
pub mod voting;
