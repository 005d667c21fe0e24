use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::gateway::GatewayError;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    Template(askama::Error),
    Gateway(GatewayError),
    Config(String),
    Unauthorized,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Migrate(e) => write!(f, "Migration error: {e}"),
            AppError::Template(e) => write!(f, "Template error: {e}"),
            AppError::Gateway(e) => write!(f, "Gateway error: {e}"),
            AppError::Config(msg) => write!(f, "Configuration error: {msg}"),
            AppError::Unauthorized => write!(f, "Unauthorized"),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthorized => HttpResponse::Unauthorized().body("Unauthorized"),
            _ => {
                log::error!("{self}");
                HttpResponse::InternalServerError().body("Internal Server Error")
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Migrate(e)
    }
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        AppError::Template(e)
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::Gateway(e)
    }
}

/// Render an askama message template into chat-ready text.
pub fn render<T: askama::Template>(tmpl: T) -> Result<String, AppError> {
    Ok(tmpl.render()?)
}
