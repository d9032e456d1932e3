use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ApiResponse;
use crate::registry::ModelLabel;

/// A model label outside the fixed menu.
#[derive(Debug, Error)]
#[error("unknown model '{label}'{}", suggestion_hint(.suggestion))]
pub struct UnknownModelError {
    pub label: String,
    pub suggestion: Option<ModelLabel>,
}

fn suggestion_hint(suggestion: &Option<ModelLabel>) -> String {
    match suggestion {
        Some(label) => format!(" (did you mean '{label}'?)"),
        None => String::new(),
    }
}

/// Failure to bring up one of the classifiers. Any one of these aborts the
/// whole registry load.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read {label} model artifact {path}: {source}")]
    Read {
        label: ModelLabel,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {label} model artifact {path}: {source}")]
    Parse {
        label: ModelLabel,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid {label} model artifact {path}: {reason}")]
    Invalid {
        label: ModelLabel,
        path: PathBuf,
        reason: String,
    },
    #[error("no classifier supplied for the {label} model")]
    Missing { label: ModelLabel },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input text is empty after normalization")]
    EmptyInput,
    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
    #[error("model returned {actual} results for a batch of {expected}")]
    BatchSize { expected: usize, actual: usize },
    #[error("model returned {actual} probabilities for {expected} classes")]
    ClassCount { expected: usize, actual: usize },
    #[error("model returned a non-finite probability")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    UnknownModel(#[from] UnknownModelError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("sqlite error while {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        source: rusqlite::Error,
    },
}

impl StorageError {
    pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Sqlite { operation, source }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("unknown page '{0}'")]
    UnknownPage(String),
    #[error("request worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Predict(PredictError::UnknownModel(_)) => StatusCode::BAD_REQUEST,
            ApiError::Predict(PredictError::Inference(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnknownPage(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ApiResponse {
            status: "error".to_string(),
            message: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}
