use std::path::PathBuf;
use std::sync::Arc;
use tag_sorter::{RuleSet, SharedRules, SortSession, SorterConfig, WatchTarget};
use tracing::{info, Level};

/// Example sorting `<folder>/[docs] ...` files into `<folder>/docs`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// Initialize logging
	tracing_subscriber::fmt().with_max_level(Level::INFO).init();

	let watch_path = match std::env::args().nth(1) {
		Some(path) => PathBuf::from(path),
		None => std::env::current_dir()?,
	};
	let watch_path = std::fs::canonicalize(watch_path)?;
	let docs = watch_path.join("docs");
	std::fs::create_dir_all(&docs)?;

	let rules = Arc::new(SharedRules::new(&watch_path, RuleSet::new()));
	rules.add_rule("[docs]", &docs)?;

	let mut session = SortSession::new(SorterConfig::default());
	let mut events = session.subscribe();
	session.start(WatchTarget::new(&watch_path), rules).await?;

	info!("Drop a file named like '[docs] notes.txt' into {:?}. Press Ctrl+C to stop.", watch_path);

	loop {
		tokio::select! {
			Some(event) = events.recv() => {
				info!("{} -> {}", event.source.display(), event.outcome.kind());
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	session.stop().await?;
	Ok(())
}
