//! Tag to destination routing rules
//!
//! Rules are normalized when they are defined: the tag is trimmed,
//! lower-cased and wrapped in brackets if the user left them out. Lookups
//! therefore compare the extracted tag verbatim.

use crate::error::{Result, SorterError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A single tag to destination association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
	pub tag: String,
	pub destination: PathBuf,
}

impl RoutingRule {
	pub fn new(tag: &str, destination: impl Into<PathBuf>) -> Result<Self> {
		let destination = destination.into();
		if !destination.is_absolute() {
			return Err(SorterError::validation_error(
				"destination",
				"must be an absolute path",
				&destination.display().to_string(),
			));
		}
		Ok(Self { tag: normalize_tag(tag)?, destination })
	}
}

/// Canonical form of a user supplied tag
pub fn normalize_tag(tag: &str) -> Result<String> {
	let trimmed = tag.trim();
	if trimmed.starts_with('[') && !trimmed.ends_with(']') {
		return Err(SorterError::validation_error("tag", "unbalanced bracket", tag));
	}
	let inner = match trimmed.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
		Some(inner) => inner,
		None => trimmed,
	};

	if inner.is_empty() && !trimmed.starts_with('[') {
		return Err(SorterError::validation_error("tag", "must not be empty", tag));
	}
	if inner.contains(']') || inner.contains('\n') {
		return Err(SorterError::validation_error(
			"tag",
			"must not contain ']' or line breaks",
			tag,
		));
	}

	Ok(format!("[{}]", inner.to_lowercase()))
}

/// Immutable mapping of normalized tags to destinations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
	rules: BTreeMap<String, PathBuf>,
}

impl RuleSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a rule set from raw pairs, normalizing every tag
	///
	/// Later pairs win when two tags normalize to the same key.
	pub fn from_pairs<I, T, P>(pairs: I) -> Result<Self>
	where
		I: IntoIterator<Item = (T, P)>,
		T: AsRef<str>,
		P: Into<PathBuf>,
	{
		let mut set = Self::new();
		for (tag, destination) in pairs {
			set.insert(RoutingRule::new(tag.as_ref(), destination)?);
		}
		Ok(set)
	}

	/// Insert or replace a rule, returning the destination it replaced
	pub fn insert(&mut self, rule: RoutingRule) -> Option<PathBuf> {
		self.rules.insert(rule.tag, rule.destination)
	}

	pub fn remove(&mut self, tag: &str) -> Option<PathBuf> {
		let key = normalize_tag(tag).ok()?;
		self.rules.remove(&key)
	}

	/// Destination for an already extracted tag
	pub fn destination_for(&self, tag: &str) -> Option<&Path> {
		self.rules.get(tag).map(PathBuf::as_path)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
		self.rules.iter().map(|(tag, destination)| (tag.as_str(), destination.as_path()))
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

/// Source of the watch root and the current rule snapshot
///
/// Implementations must be cheap to query; the dispatcher asks for a fresh
/// snapshot for every stable arrival.
pub trait RuleProvider: Send + Sync {
	fn watch_root(&self) -> PathBuf;

	fn rules(&self) -> Arc<RuleSet>;
}

/// Thread-safe rule store with snapshot-on-read semantics
///
/// Writers build a new [`RuleSet`] and swap it in; readers keep whatever
/// snapshot they were handed.
#[derive(Debug, Default)]
pub struct SharedRules {
	watch_root: RwLock<PathBuf>,
	rules: RwLock<Arc<RuleSet>>,
}

impl SharedRules {
	pub fn new(watch_root: impl Into<PathBuf>, rules: RuleSet) -> Self {
		Self {
			watch_root: RwLock::new(watch_root.into()),
			rules: RwLock::new(Arc::new(rules)),
		}
	}

	pub fn set_watch_root(&self, root: impl Into<PathBuf>) {
		*self.watch_root.write().unwrap_or_else(|e| e.into_inner()) = root.into();
	}

	/// Replace the whole rule set
	pub fn replace(&self, rules: RuleSet) {
		*self.rules.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(rules);
	}

	pub fn add_rule(&self, tag: &str, destination: impl Into<PathBuf>) -> Result<()> {
		let rule = RoutingRule::new(tag, destination)?;
		self.update(|rules| {
			rules.insert(rule);
		});
		Ok(())
	}

	pub fn remove_rule(&self, tag: &str) -> Option<PathBuf> {
		let mut removed = None;
		self.update(|rules| removed = rules.remove(tag));
		removed
	}

	fn update(&self, mutate: impl FnOnce(&mut RuleSet)) {
		let mut guard = self.rules.write().unwrap_or_else(|e| e.into_inner());
		let mut next = RuleSet::clone(&guard);
		mutate(&mut next);
		*guard = Arc::new(next);
	}
}

impl RuleProvider for SharedRules {
	fn watch_root(&self) -> PathBuf {
		self.watch_root.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	fn rules(&self) -> Arc<RuleSet> {
		Arc::clone(&self.rules.read().unwrap_or_else(|e| e.into_inner()))
	}
}
