//! Error types for the capability directory and lease manager.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LabError>;

/// Errors raised by the device lab core.
///
/// `InvalidInput`, `Conflict` and `NotFound` are the caller-facing kinds and
/// propagate to the HTTP boundary. `Upstream` and the transport variants stay
/// inside discovery and lease refresh, where they are logged and contained.
#[derive(Debug, Error)]
pub enum LabError {
	#[error("{0}")]
	InvalidInput(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	NotFound(String),

	#[error("upstream {source_url} unavailable: {message}")]
	Upstream { source_url: String, message: String },

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid URL: {0}")]
	Url(#[from] url::ParseError),
}

impl LabError {
	pub fn upstream(source_url: impl Into<String>, message: impl fmt::Display) -> Self {
		Self::Upstream {
			source_url: source_url.into(),
			message: message.to_string(),
		}
	}

	/// Stable, machine-readable classification of this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::InvalidInput(_) => ErrorCode::InvalidInput,
			Self::Conflict(_) => ErrorCode::Conflict,
			Self::NotFound(_) => ErrorCode::NotFound,
			Self::Upstream { .. } | Self::Http(_) => ErrorCode::UpstreamUnavailable,
			Self::Json(_) | Self::Io(_) | Self::Url(_) => ErrorCode::InternalError,
		}
	}
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	InvalidInput,
	Conflict,
	NotFound,
	UpstreamUnavailable,
	InternalError,
}

impl ErrorCode {
	/// HTTP status code the boundary layer answers with.
	pub fn http_status(self) -> u16 {
		match self {
			Self::InvalidInput => 400,
			Self::NotFound => 404,
			Self::Conflict => 409,
			Self::UpstreamUnavailable => 502,
			Self::InternalError => 500,
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::Conflict => write!(f, "CONFLICT"),
			ErrorCode::NotFound => write!(f, "NOT_FOUND"),
			ErrorCode::UpstreamUnavailable => write!(f, "UPSTREAM_UNAVAILABLE"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}
