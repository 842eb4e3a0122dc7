mod error;
mod events;
mod rules;
mod settings;
pub mod sorting;
mod watcher;

pub use error::{Result, SorterError};
pub use events::{ArrivalKind, MoveOutcome, SortEvent};
pub use rules::{normalize_tag, RoutingRule, RuleProvider, RuleSet, SharedRules};
pub use settings::{Settings, DEFAULT_SETTINGS_FILE};
pub use sorting::{
	extract_tag, resolve_destination, strip_tag, ArrivalPipeline, MoveExecutor, MoveMethod,
	SortError, SorterConfig, StabilityDetector,
};
pub use watcher::{SessionState, SortSession, WatchTarget};
