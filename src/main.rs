use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tag_sorter::{
	MoveOutcome, RuleProvider, Settings, SortSession, SorterConfig, WatchTarget,
	DEFAULT_SETTINGS_FILE,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "tag-sorter")]
#[command(about = "Moves files dropped into a folder to destinations chosen by a leading [tag]")]
struct Cli {
	/// Settings file holding the rules and the watch folder
	#[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
	settings: PathBuf,

	/// Enable verbose logging
	#[arg(short, long)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Watch the folder and sort arrivals until Ctrl+C
	Watch {
		/// Folder to watch instead of the saved one
		#[arg(short, long)]
		folder: Option<PathBuf>,

		/// Seconds to wait for a file to stop changing
		#[arg(short, long, default_value_t = 30.0)]
		timeout: f64,

		/// Seconds between size samples
		#[arg(short, long, default_value_t = 1.0)]
		interval: f64,

		/// Seconds to pause before moving a stable file
		#[arg(long, default_value_t = 1.0)]
		settle: f64,

		/// Also sort files renamed into the folder
		#[arg(long)]
		include_renames: bool,
	},
	/// Manage sorting rules
	Rules {
		#[command(subcommand)]
		action: RulesAction,
	},
	/// Save the folder to watch
	SetFolder { folder: PathBuf },
}

#[derive(Subcommand)]
enum RulesAction {
	/// Show all rules
	List,
	/// Add or replace a rule
	Add { tag: String, destination: PathBuf },
	/// Remove a rule
	Remove { tag: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	// Initialize tracing
	let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
	tracing_subscriber::fmt().with_max_level(level).init();

	let mut settings = Settings::load(&cli.settings)
		.with_context(|| format!("Failed to load settings from {:?}", cli.settings))?;

	match cli.command {
		Command::Watch { folder, timeout, interval, settle, include_renames } => {
			if let Some(folder) = folder {
				settings.set_watch_folder(absolute(folder)?)?;
			}
			let config = SorterConfig {
				stability_timeout: seconds("timeout", timeout)?,
				poll_interval: seconds("interval", interval)?,
				settle_delay: seconds("settle", settle)?,
				include_renames,
				..SorterConfig::default()
			};
			watch(settings, config).await
		}
		Command::Rules { action } => {
			match action {
				RulesAction::List => {
					if settings.sorting_rules.is_empty() {
						println!("No rules defined");
					}
					for (tag, destination) in &settings.sorting_rules {
						println!("{tag} -> {}", destination.display());
					}
					return Ok(());
				}
				RulesAction::Add { tag, destination } => {
					let destination = absolute(destination)?;
					if !destination.is_dir() {
						warn!("{:?} does not exist yet; matching files will stay in place", destination);
					}
					let tag = settings.add_rule(&tag, &destination)?;
					println!("Added {tag} -> {}", destination.display());
				}
				RulesAction::Remove { tag } => match settings.remove_rule(&tag)? {
					Some(destination) => println!("Removed {tag} -> {}", destination.display()),
					None => println!("No rule for {tag}"),
				},
			}
			save(&settings, &cli.settings)
		}
		Command::SetFolder { folder } => {
			settings.set_watch_folder(absolute(folder)?)?;
			println!("Watch folder set to {}", settings.watch_folder.display());
			save(&settings, &cli.settings)
		}
	}
}

async fn watch(settings: Settings, config: SorterConfig) -> anyhow::Result<()> {
	let rules = Arc::new(settings.to_shared_rules()?);
	if rules.rules().is_empty() {
		warn!("No sorting rules defined; every arrival will stay in place");
	}

	let mut session = SortSession::new(config);
	let mut events = session.subscribe();
	let target = WatchTarget::from_provider(&*rules);
	if let Err(e) = session.start(target.clone(), rules).await {
		if e.is_configuration_error() {
			warn!("Check the watch folder (`tag-sorter set-folder <DIR>`) and the timing flags");
		}
		return Err(e).with_context(|| format!("Failed to watch {:?}", target.root));
	}

	info!("Press Ctrl+C to stop");
	let printer = tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			match &event.outcome {
				MoveOutcome::Moved(destination) => {
					println!("{} -> {}", event.source.display(), destination.display())
				}
				MoveOutcome::Failed(reason) => {
					println!("{} failed: {reason}", event.source.display())
				}
				other => println!("{} {}", event.source.display(), other.kind()),
			}
		}
	});

	tokio::signal::ctrl_c().await?;
	info!("Shutting down sorter...");
	session.stop().await?;

	// Dropping the session closes the status channel and ends the printer
	drop(session);
	printer.await?;
	Ok(())
}

fn seconds(name: &str, value: f64) -> anyhow::Result<Duration> {
	Duration::try_from_secs_f64(value).with_context(|| format!("Invalid --{name} value: {value}"))
}

fn absolute(path: PathBuf) -> anyhow::Result<PathBuf> {
	if path.is_absolute() {
		return Ok(path);
	}
	Ok(std::env::current_dir()?.join(path))
}

fn save(settings: &Settings, path: &Path) -> anyhow::Result<()> {
	settings
		.save(path)
		.with_context(|| format!("Failed to save settings to {:?}", path))
}
