// src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

pub const NOT_CONNECTED_MESSAGE: &str =
    "WhatsApp belum terhubung. Jalankan bot lalu scan QR terlebih dahulu.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Payload tidak valid")]
    InvalidPayload,

    #[error("{}", NOT_CONNECTED_MESSAGE)]
    NotConnected,

    #[error("{0}")]
    Send(SessionError),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected => ApiError::NotConnected,
            other => ApiError::Send(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload => StatusCode::BAD_REQUEST,
            ApiError::NotConnected | ApiError::Send(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "ok": false,
            "error": self.to_string(),
        }))
    }
}
