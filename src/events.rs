use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// How a raw notification relates to files arriving in the watch root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalKind {
	/// A new entry was created
	Created,
	/// An entry was renamed into place
	RenamedIn,
	/// A directory was created
	Directory,
	/// Anything else (writes, removals, access)
	Ignored,
}

impl From<notify::EventKind> for ArrivalKind {
	fn from(kind: notify::EventKind) -> Self {
		match kind {
			notify::EventKind::Create(notify::event::CreateKind::Folder) => ArrivalKind::Directory,
			notify::EventKind::Create(_) => ArrivalKind::Created,
			notify::EventKind::Modify(notify::event::ModifyKind::Name(rename_mode)) => {
				match rename_mode {
					notify::event::RenameMode::To | notify::event::RenameMode::Both => {
						ArrivalKind::RenamedIn
					}
					_ => ArrivalKind::Ignored,
				}
			}
			_ => ArrivalKind::Ignored,
		}
	}
}

/// Terminal result of processing one arrival
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum MoveOutcome {
	Moved(PathBuf),
	SkippedNoTag,
	SkippedUnknownTag,
	SkippedMissingDestination,
	SkippedTimeout,
	Failed(String),
}

impl MoveOutcome {
	pub fn kind(&self) -> &'static str {
		match self {
			MoveOutcome::Moved(_) => "moved",
			MoveOutcome::SkippedNoTag => "skipped_no_tag",
			MoveOutcome::SkippedUnknownTag => "skipped_unknown_tag",
			MoveOutcome::SkippedMissingDestination => "skipped_missing_destination",
			MoveOutcome::SkippedTimeout => "skipped_timeout",
			MoveOutcome::Failed(_) => "failed",
		}
	}

	pub fn is_moved(&self) -> bool {
		matches!(self, MoveOutcome::Moved(_))
	}

	pub fn is_skipped(&self) -> bool {
		matches!(
			self,
			MoveOutcome::SkippedNoTag
				| MoveOutcome::SkippedUnknownTag
				| MoveOutcome::SkippedMissingDestination
				| MoveOutcome::SkippedTimeout
		)
	}
}

/// Status record emitted once per processed arrival
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortEvent {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub source: PathBuf,
	pub tag: Option<String>,
	pub destination: Option<PathBuf>,
	pub outcome: MoveOutcome,
}

impl SortEvent {
	pub fn new(source: &Path, tag: Option<String>, outcome: MoveOutcome) -> Self {
		let destination = match &outcome {
			MoveOutcome::Moved(path) => Some(path.clone()),
			_ => None,
		};
		Self {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			source: source.to_path_buf(),
			tag,
			destination,
			outcome,
		}
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}
