//! Move engine specific error types

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SortError {
	#[error("Destination became occupied before the move: {path}")]
	CollisionRace { path: String },

	#[error("Rename failed: {from} -> {to} - {cause}")]
	RenameFailed { from: String, to: String, cause: String },

	#[error("Copy failed: {from} -> {to} - {cause}")]
	CopyFailed { from: String, to: String, cause: String },

	#[error("Copy verification failed: {from} -> {to} - {details}")]
	VerificationFailed { from: String, to: String, details: String },

	#[error("Failed to remove source after copy: {path} - {cause}")]
	SourceRemovalFailed { path: String, cause: String },

	#[error("Invalid source: {path} - {reason}")]
	InvalidSource { path: String, reason: String },

	#[error("Move task failed: {details}")]
	TaskFailed { details: String },
}

impl SortError {
	/// Check if this error indicates that the operation should be retried
	pub fn is_retryable(&self) -> bool {
		matches!(self, SortError::CollisionRace { .. })
	}

	/// Get error category for logging
	pub fn category(&self) -> &'static str {
		match self {
			SortError::CollisionRace { .. } => "collision",
			SortError::RenameFailed { .. } => "rename",
			SortError::CopyFailed { .. } => "copy",
			SortError::VerificationFailed { .. } => "verification",
			SortError::SourceRemovalFailed { .. } => "source_removal",
			SortError::InvalidSource { .. } => "source",
			SortError::TaskFailed { .. } => "task",
		}
	}

	pub fn collision_race(path: &Path) -> Self {
		SortError::CollisionRace { path: path.display().to_string() }
	}

	pub fn rename_failed(from: &Path, to: &Path, cause: &std::io::Error) -> Self {
		SortError::RenameFailed {
			from: from.display().to_string(),
			to: to.display().to_string(),
			cause: cause.to_string(),
		}
	}

	pub fn copy_failed(from: &Path, to: &Path, cause: &std::io::Error) -> Self {
		SortError::CopyFailed {
			from: from.display().to_string(),
			to: to.display().to_string(),
			cause: cause.to_string(),
		}
	}

	pub fn verification_failed(from: &Path, to: &Path, details: &str) -> Self {
		SortError::VerificationFailed {
			from: from.display().to_string(),
			to: to.display().to_string(),
			details: details.to_string(),
		}
	}

	pub fn source_removal_failed(path: &Path, cause: &std::io::Error) -> Self {
		SortError::SourceRemovalFailed {
			path: path.display().to_string(),
			cause: cause.to_string(),
		}
	}

	pub fn invalid_source(path: &Path, reason: &str) -> Self {
		SortError::InvalidSource {
			path: path.display().to_string(),
			reason: reason.to_string(),
		}
	}
}
