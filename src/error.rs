use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

// Based on https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct RunnerError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpErrorResponse {
    pub error: String,
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { error: message }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(message: &str) -> Self {
        HttpErrorResponse {
            error: message.to_string(),
        }
    }
}

impl RunnerError {
    pub fn new(status: StatusCode, message: impl Into<HttpErrorResponse>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for RunnerError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

impl<E> From<E> for RunnerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        RunnerError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: HttpErrorResponse::from(format!("{:#}", err.into())),
        }
    }
}

pub type RunnerResult<T, E = RunnerError> = Result<T, E>;

#[macro_export]
macro_rules! bail_runner {
    ($error_message:expr) => {
        return Err($crate::error::RunnerError::new(
            ::axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            $error_message,
        ))
    };
    ($status_code:expr, $error_message:expr) => {
        return Err($crate::error::RunnerError::new($status_code, $error_message))
    };
    ($status_code:expr, $fmt:expr $(, $arg:expr)+) => {
        return Err($crate::error::RunnerError::new(
            $status_code,
            format!($fmt $(, $arg)+),
        ))
    };
}

/// Errors surfaced to callers of [`crate::client::EndpointClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint responded with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("job {id} failed: {error}")]
    JobFailed { id: String, error: String },

    #[error("job {id} did not finish within {waited:?}")]
    Timeout { id: String, waited: Duration },

    #[error("job {0} completed without an output payload")]
    MissingOutput(String),

    #[error("endpoint returned an empty job handle")]
    EmptyHandle,
}

impl ClientError {
    /// Terminal job outcomes, as opposed to transport or protocol trouble.
    pub fn is_job_failure(&self) -> bool {
        matches!(self, ClientError::JobFailed { .. })
    }
}
