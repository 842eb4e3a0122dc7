//! Persisted sorter settings
//!
//! Stored as a JSON document holding the tag rules and the watch folder:
//!
//! ```json
//! {
//!   "sorting_rules": { "[invoice]": "/home/me/Documents/Invoices" },
//!   "watch_folder": "/home/me/Downloads"
//! }
//! ```

use crate::error::{Result, SorterError};
use crate::rules::{normalize_tag, RoutingRule, RuleSet, SharedRules};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_SETTINGS_FILE: &str = "sorting_rules.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub sorting_rules: BTreeMap<String, PathBuf>,
	#[serde(default)]
	pub watch_folder: PathBuf,
}

impl Settings {
	/// Load settings from `path`; a missing file yields empty settings
	pub fn load(path: &Path) -> Result<Self> {
		if !path.exists() {
			debug!("No settings at {:?}, starting empty", path);
			return Ok(Self::default());
		}

		let contents = std::fs::read_to_string(path)?;
		let raw: Settings = serde_json::from_str(&contents)?;

		// Re-key through normalization so hand-edited files behave like CLI edits
		let mut settings = Settings { watch_folder: raw.watch_folder, ..Default::default() };
		// A bad entry is dropped on its own so the remaining rules stay usable
		for (tag, destination) in raw.sorting_rules {
			match RoutingRule::new(&tag, destination) {
				Ok(rule) => {
					settings.sorting_rules.insert(rule.tag, rule.destination);
				}
				Err(e) => warn!("Skipping rule {:?} in {:?} ({}): {}", tag, path, e.category(), e),
			}
		}
		Ok(settings)
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)?;
		std::fs::write(path, json)?;
		Ok(())
	}

	/// Add or replace a rule, returning the normalized tag
	pub fn add_rule(&mut self, tag: &str, destination: impl Into<PathBuf>) -> Result<String> {
		let rule = RoutingRule::new(tag, destination)?;
		let key = rule.tag.clone();
		self.sorting_rules.insert(rule.tag, rule.destination);
		Ok(key)
	}

	pub fn remove_rule(&mut self, tag: &str) -> Result<Option<PathBuf>> {
		let key = normalize_tag(tag)?;
		Ok(self.sorting_rules.remove(&key))
	}

	pub fn set_watch_folder(&mut self, folder: impl Into<PathBuf>) -> Result<()> {
		let folder = folder.into();
		if folder.as_os_str().is_empty() {
			return Err(SorterError::validation_error("watch_folder", "must not be empty", ""));
		}
		self.watch_folder = folder;
		Ok(())
	}

	pub fn rule_set(&self) -> Result<RuleSet> {
		RuleSet::from_pairs(self.sorting_rules.iter().map(|(tag, dest)| (tag, dest.clone())))
	}

	/// Build a live rule store for a session
	pub fn to_shared_rules(&self) -> Result<SharedRules> {
		if self.watch_folder.as_os_str().is_empty() {
			return Err(SorterError::configuration_error(
				"watch_folder",
				"no watch folder configured",
			));
		}
		Ok(SharedRules::new(self.watch_folder.clone(), self.rule_set()?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rules::RuleProvider;
	use tempfile::TempDir;

	#[test]
	fn test_missing_file_loads_empty() {
		let temp_dir = TempDir::new().unwrap();
		let settings = Settings::load(&temp_dir.path().join(DEFAULT_SETTINGS_FILE)).unwrap();
		assert_eq!(settings, Settings::default());
	}

	#[test]
	fn test_save_and_load() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("config").join(DEFAULT_SETTINGS_FILE);
		let invoices = temp_dir.path().join("invoices");

		let mut settings = Settings::default();
		assert_eq!(settings.add_rule("Invoice", &invoices).unwrap(), "[invoice]");
		settings.set_watch_folder(temp_dir.path()).unwrap();
		settings.save(&path).unwrap();

		let loaded = Settings::load(&path).unwrap();
		assert_eq!(loaded, settings);

		let raw = std::fs::read_to_string(&path).unwrap();
		assert!(raw.contains("\"sorting_rules\""));
		assert!(raw.contains("\"watch_folder\""));
	}

	#[test]
	fn test_hand_edited_tags_are_normalized() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join(DEFAULT_SETTINGS_FILE);
		let dest = temp_dir.path().join("dest");
		let json = serde_json::json!({
			"sorting_rules": { "[INVOICE]": dest },
			"watch_folder": temp_dir.path(),
		});
		std::fs::write(&path, json.to_string()).unwrap();

		let settings = Settings::load(&path).unwrap();
		assert_eq!(settings.sorting_rules.get("[invoice]"), Some(&dest));
		assert!(!settings.sorting_rules.contains_key("[INVOICE]"));
	}

	#[test]
	fn test_invalid_rule_is_skipped_on_load() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join(DEFAULT_SETTINGS_FILE);
		let invoices = temp_dir.path().join("invoices");
		let json = serde_json::json!({
			"sorting_rules": {
				"[photos]": "relative/photos",
				"[invoice]": invoices,
			},
			"watch_folder": temp_dir.path(),
		});
		std::fs::write(&path, json.to_string()).unwrap();

		let mut settings = Settings::load(&path).unwrap();
		assert_eq!(settings.sorting_rules.len(), 1);
		assert_eq!(settings.sorting_rules.get("[invoice]"), Some(&invoices));
		assert!(!settings.sorting_rules.contains_key("[photos]"));

		// Other commands keep working, and saving drops the bad entry from disk
		assert_eq!(settings.remove_rule("invoice").unwrap(), Some(invoices));
		settings.save(&path).unwrap();
		assert!(!std::fs::read_to_string(&path).unwrap().contains("relative/photos"));
	}

	#[test]
	fn test_invalid_json_is_an_error() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join(DEFAULT_SETTINGS_FILE);
		std::fs::write(&path, "{ not json").unwrap();

		let err = Settings::load(&path).unwrap_err();
		assert_eq!(err.category(), "serialization");
	}

	#[test]
	fn test_remove_rule_normalizes() {
		let temp_dir = TempDir::new().unwrap();
		let mut settings = Settings::default();
		settings.add_rule("[invoice]", temp_dir.path()).unwrap();

		assert_eq!(settings.remove_rule("INVOICE").unwrap(), Some(temp_dir.path().to_path_buf()));
		assert!(settings.sorting_rules.is_empty());
	}

	#[test]
	fn test_to_shared_rules() {
		let temp_dir = TempDir::new().unwrap();
		let mut settings = Settings::default();
		assert!(settings.to_shared_rules().is_err());

		settings.set_watch_folder(temp_dir.path()).unwrap();
		settings.add_rule("[invoice]", temp_dir.path().join("inv")).unwrap();

		let shared = settings.to_shared_rules().unwrap();
		assert_eq!(shared.watch_root(), temp_dir.path());
		assert!(shared.rules().destination_for("[invoice]").is_some());
	}
}
