use thiserror::Error;

/// Core sorter error types
///
/// This enum contains the errors surfaced by sessions, rule storage and settings.
/// Errors raised while moving a single file live in `crate::sorting::SortError`
/// and are wrapped here when they need to cross a module boundary.
#[derive(Error, Debug)]
pub enum SorterError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Notify error: {0}")]
	Notify(#[from] notify::Error),

	#[error("JSON serialization error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Channel send error")]
	ChannelSend,

	#[error("Invalid path: {path}")]
	InvalidPath { path: String },

	#[error("Session not running")]
	NotRunning,

	#[error("Configuration error: {parameter} - {reason}")]
	ConfigurationError { parameter: String, reason: String },

	#[error("Validation error: {field} is invalid - {reason} (value: {value})")]
	ValidationError {
		field: String,
		reason: String,
		value: String,
	},

	#[error("Sort error: {0}")]
	Sort(#[from] crate::sorting::SortError),
}

impl SorterError {
	/// Check if this error is related to configuration issues
	pub fn is_configuration_error(&self) -> bool {
		matches!(
			self,
			SorterError::ConfigurationError { .. }
				| SorterError::InvalidPath { .. }
				| SorterError::ValidationError { .. }
		)
	}

	/// Get error category for logging
	pub fn category(&self) -> &'static str {
		match self {
			SorterError::Io(_) => "io",
			SorterError::Notify(_) => "notify",
			SorterError::Json(_) => "serialization",
			SorterError::ChannelSend => "channel",
			SorterError::InvalidPath { .. } => "configuration",
			SorterError::NotRunning => "lifecycle",
			SorterError::ConfigurationError { .. } => "configuration",
			SorterError::ValidationError { .. } => "validation",
			SorterError::Sort(sort_err) => sort_err.category(),
		}
	}

	/// Create an invalid path error
	pub fn invalid_path(path: &std::path::Path) -> Self {
		SorterError::InvalidPath { path: path.display().to_string() }
	}

	/// Create a configuration error
	pub fn configuration_error(parameter: &str, reason: &str) -> Self {
		SorterError::ConfigurationError {
			parameter: parameter.to_string(),
			reason: reason.to_string(),
		}
	}

	/// Create a validation error
	pub fn validation_error(field: &str, reason: &str, value: &str) -> Self {
		SorterError::ValidationError {
			field: field.to_string(),
			reason: reason.to_string(),
			value: value.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, SorterError>;
