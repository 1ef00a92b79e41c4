//! Error types for carrier catalog loading and resolution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrierError {
	#[error("failed to read UTSF file {path}: {source}")]
	Io { path: String, #[source] source: std::io::Error },
	#[error("failed to parse UTSF file {path}: {source}")]
	Parse { path: String, #[source] source: serde_json::Error },
	#[error("carrier not found: {0}")]
	NotFound(String),
	#[error("document store error: {0}")]
	Store(String),
}
