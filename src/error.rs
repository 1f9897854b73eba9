//! Request-level error type and its HTTP rendering.

use std::io::Cursor;

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use serde::Serialize;

use crate::commands::CommandError;

#[derive(Debug)]
pub enum ApiError {
    /// Request is structurally wrong: missing field, unknown command,
    /// unusable dump file name.
    BadRequest(String),
    /// Password missing or wrong.
    Unauthorized,
    /// A dispatched command started and failed.
    CommandFailed(String),
    /// Server-side failure outside any command (hashing backend, config).
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
            ApiError::Unauthorized => {
                log::debug!("rejected request: missing or wrong password");
                (
                    Status::Unauthorized,
                    "Unauthorized",
                    "wrong password".to_string(),
                )
            }
            ApiError::CommandFailed(msg) => {
                log::error!("command failed: {}", msg);
                (Status::InternalServerError, "CommandFailed", msg)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (Status::InternalServerError, "InternalError", msg)
            }
        };

        let body = serde_json::to_string(&ErrorResponse {
            error: error_type.to_string(),
            message,
        })
        .unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::MissingField(field) => {
                ApiError::BadRequest(format!("missing form field `{field}`"))
            }
            other => ApiError::CommandFailed(other.to_string()),
        }
    }
}
