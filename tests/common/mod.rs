//! Common test utilities for the tag-sorter library

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;
use tag_sorter::{SortEvent, SorterConfig};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// Create a temporary directory for testing
pub fn setup_temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temp directory")
}

/// Create a test file with content
pub fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
	std::fs::write(path, content)
}

/// Create `name` under `parent` and return its path
pub fn create_dir(parent: &Path, name: &str) -> PathBuf {
	let dir = parent.join(name);
	std::fs::create_dir_all(&dir).expect("Failed to create directory");
	dir
}

/// Timings short enough for tests but long enough for a watcher to keep up
pub fn fast_config() -> SorterConfig {
	SorterConfig::scaled(Duration::from_millis(20))
}

/// Wait for a short duration to allow the watcher to register
pub async fn wait_for_watcher() {
	tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Receive the next event or give up after `timeout`
pub async fn next_event(
	receiver: &mut UnboundedReceiver<SortEvent>, timeout: Duration,
) -> Option<SortEvent> {
	tokio::time::timeout(timeout, receiver.recv()).await.ok().flatten()
}

/// Collect every event that arrives within `window`
pub async fn collect_events(
	receiver: &mut UnboundedReceiver<SortEvent>, window: Duration,
) -> Vec<SortEvent> {
	let deadline = tokio::time::Instant::now() + window;
	let mut events = Vec::new();
	while let Ok(Some(event)) = tokio::time::timeout_at(deadline, receiver.recv()).await {
		events.push(event);
	}
	events
}

/// File names directly inside `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
	let mut names: Vec<String> = std::fs::read_dir(dir)
		.expect("Failed to read directory")
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.file_name().to_string_lossy().into_owned())
		.collect();
	names.sort();
	names
}
