//! Rosetta error taxonomy. Codes are stable and callers key off them.

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum::IntoEnumIterator;

use super::types::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum ErrorKind {
    NotReady,
    NotImplemented,
    NotSupported,
    UnavailableOffline,
    InternalError,
    InvalidInput,
    ClientError,
    BlockInvalidInput,
    BlockNotFound,
    CallInvalidMethod,
    CallInvalidParams,
    TransactionNotFound,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        match self {
            Self::NotReady => 1,
            Self::NotImplemented => 2,
            Self::NotSupported => 3,
            Self::UnavailableOffline => 4,
            Self::InternalError => 5,
            Self::InvalidInput => 6,
            Self::ClientError => 7,
            Self::BlockInvalidInput => 8,
            Self::BlockNotFound => 9,
            Self::CallInvalidMethod => 10,
            Self::CallInvalidParams => 11,
            Self::TransactionNotFound => 12,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NotReady => "Node is not ready",
            Self::NotImplemented => "Endpoint is not implemented",
            Self::NotSupported => "Endpoint is not supported",
            Self::UnavailableOffline => "Endpoint is not available offline",
            Self::InternalError => "Internal server error",
            Self::InvalidInput => "Invalid input",
            Self::ClientError => "Client error",
            Self::BlockInvalidInput => "Block number or hash is required",
            Self::BlockNotFound => "Block was not found",
            Self::CallInvalidMethod => "Invalid call method",
            Self::CallInvalidParams => "invalid call params",
            Self::TransactionNotFound => "Transaction was not found",
        }
    }

    /// Whether retrying the same request may succeed later.
    pub fn retriable(self) -> bool {
        matches!(
            self,
            Self::NotReady | Self::InternalError | Self::ClientError | Self::BlockNotFound
        )
    }
}

/// The error body of every failed Rosetta call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RosettaError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub retriable: bool,
    #[serde(default)]
    pub details: Metadata,
}

impl RosettaError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            code: kind.code(),
            message: kind.message().to_owned(),
            description: None,
            retriable: kind.retriable(),
            details: Metadata::new(),
        }
    }

    /// Error of `kind` with `detail` under `details.error`.
    pub fn wrap(kind: ErrorKind, detail: impl Display) -> Self {
        let mut err = Self::new(kind);
        err.details
            .insert("error".to_owned(), Value::String(detail.to_string()));
        err
    }

    /// Every kind, in code order, as advertised by `/network/options`.
    pub fn all() -> Vec<Self> {
        ErrorKind::iter().map(Self::new).collect()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.code == kind.code()
    }

    /// The wrapped detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

impl From<ErrorKind> for RosettaError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Rosetta reports every failure as HTTP 500 with the error as body.
impl IntoResponse for RosettaError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

pub type RosettaResult<T> = Result<T, RosettaError>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;

    use super::*;

    #[test]
    fn codes_are_contiguous_from_one() {
        let codes: Vec<i32> = RosettaError::all().iter().map(|e| e.code).collect();
        assert!(codes == (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn wrap_puts_detail_under_error() {
        let err = RosettaError::wrap(ErrorKind::InternalError, "new block added while fetching utxos");
        assert!(err.code == 5);
        assert!(err.retriable);
        assert!(err.detail() == Some("new block added while fetching utxos"));
    }

    #[test]
    fn transaction_not_found_is_final() {
        assert!(!ErrorKind::TransactionNotFound.retriable());
        assert!(ErrorKind::BlockNotFound.retriable());
        assert!(!ErrorKind::UnavailableOffline.retriable());
    }

    #[test]
    fn error_response_is_http_500() {
        let response = RosettaError::new(ErrorKind::NotSupported).into_response();
        assert!(response.status() == StatusCode::INTERNAL_SERVER_ERROR);
    }
}
