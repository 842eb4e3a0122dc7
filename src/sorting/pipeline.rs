use crate::events::{MoveOutcome, SortEvent};
use crate::rules::RuleProvider;
use crate::sorting::config::SorterConfig;
use crate::sorting::error::SortError;
use crate::sorting::executor::{MoveExecutor, MoveMethod};
use crate::sorting::resolver::resolve_destination;
use crate::sorting::stability::StabilityDetector;
use crate::sorting::tag::{extract_tag, strip_tag};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything that happens to one arrival once its notification is accepted
pub struct ArrivalPipeline {
	detector: StabilityDetector,
	executor: MoveExecutor,
	provider: Arc<dyn RuleProvider>,
	strip_tag: bool,
}

impl ArrivalPipeline {
	pub fn new(config: &SorterConfig, provider: Arc<dyn RuleProvider>) -> Self {
		Self::with_parts(
			StabilityDetector::new(config),
			MoveExecutor::new(config),
			provider,
			config.strip_tag,
		)
	}

	pub fn with_parts(
		detector: StabilityDetector, executor: MoveExecutor, provider: Arc<dyn RuleProvider>,
		strip_tag: bool,
	) -> Self {
		Self { detector, executor, provider, strip_tag }
	}

	/// Wait for `path` to settle, then route it by tag
	///
	/// Never fails: every problem is reported through the returned event's outcome.
	pub async fn process(&self, path: &Path) -> SortEvent {
		let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned());
		let tag = file_name.as_deref().and_then(extract_tag);

		let report = self.detector.wait_until_stable(path).await;
		if !report.is_stable() {
			return SortEvent::new(path, tag, MoveOutcome::SkippedTimeout);
		}

		let outcome = match (&file_name, &tag) {
			(Some(file_name), Some(tag)) => self.route(path, file_name, tag).await,
			_ => {
				info!("No tag on {:?}, leaving it in place", path);
				MoveOutcome::SkippedNoTag
			}
		};

		SortEvent::new(path, tag, outcome)
	}

	async fn route(&self, path: &Path, file_name: &str, tag: &str) -> MoveOutcome {
		let rules = self.provider.rules();
		let Some(destination_dir) = rules.destination_for(tag) else {
			info!("No rule for tag {} ({:?}), leaving it in place", tag, path);
			return MoveOutcome::SkippedUnknownTag;
		};

		if !destination_dir.is_dir() {
			warn!(
				"Destination {:?} for tag {} does not exist, leaving {:?} in place",
				destination_dir, tag, path
			);
			return MoveOutcome::SkippedMissingDestination;
		}

		let target_name = if self.strip_tag { strip_tag(file_name) } else { file_name };
		match self.move_into(path, destination_dir, target_name).await {
			Ok(destination) => MoveOutcome::Moved(destination),
			Err(e) => {
				error!("Failed to move {:?} ({}): {}", path, e.category(), e);
				MoveOutcome::Failed(e.to_string())
			}
		}
	}

	/// Resolve a free name and move, re-resolving once if the name gets taken
	async fn move_into(
		&self, source: &Path, destination_dir: &Path, file_name: &str,
	) -> Result<PathBuf, SortError> {
		let destination = resolve_destination(destination_dir, file_name);
		match self.executor.execute(source, &destination).await {
			Ok(method) => {
				log_move(source, &destination, method);
				Ok(destination)
			}
			Err(e) if e.is_retryable() => {
				warn!("{:?} could not be used ({}), resolving again", destination, e.category());
				let destination = resolve_destination(destination_dir, file_name);
				let method = self.executor.execute(source, &destination).await?;
				log_move(source, &destination, method);
				Ok(destination)
			}
			Err(e) => Err(e),
		}
	}
}

fn log_move(source: &Path, destination: &Path, method: MoveMethod) {
	match method {
		MoveMethod::Renamed => info!("Moved {:?} -> {:?}", source, destination),
		MoveMethod::Copied { bytes } => {
			info!("Copied {:?} -> {:?} ({} bytes) and removed the source", source, destination, bytes)
		}
	}
}
