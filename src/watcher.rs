use crate::error::{Result, SorterError};
use crate::events::{ArrivalKind, SortEvent};
use crate::rules::RuleProvider;
use crate::sorting::{ArrivalPipeline, SortError, SorterConfig};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use tokio::sync::{mpsc as tokio_mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Stopped,
	Running,
}

/// Directory a session watches for arrivals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
	pub root: PathBuf,
	pub recursive: bool,
}

impl WatchTarget {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into(), recursive: false }
	}

	pub fn from_provider(provider: &dyn RuleProvider) -> Self {
		Self::new(provider.watch_root())
	}
}

type InFlight = Arc<Mutex<HashSet<PathBuf>>>;

/// Marks a path as being processed until dropped
struct InFlightGuard {
	in_flight: InFlight,
	path: PathBuf,
}

impl InFlightGuard {
	/// Returns `None` if the path is already claimed
	fn claim(in_flight: &InFlight, path: &Path) -> Option<Self> {
		let mut paths = in_flight.lock().unwrap_or_else(|e| e.into_inner());
		if !paths.insert(path.to_path_buf()) {
			return None;
		}
		Some(Self { in_flight: Arc::clone(in_flight), path: path.to_path_buf() })
	}
}

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.path);
	}
}

struct RunningSession {
	target: WatchTarget,
	watcher: RecommendedWatcher,
	intake: tokio_mpsc::UnboundedSender<PathBuf>,
	shutdown: oneshot::Sender<()>,
	dispatcher: JoinHandle<()>,
	in_flight: InFlight,
}

/// A watch session that sorts every file arriving in its root
pub struct SortSession {
	config: SorterConfig,
	status_sink: Option<tokio_mpsc::UnboundedSender<SortEvent>>,
	running: Option<RunningSession>,
}

impl SortSession {
	pub fn new(config: SorterConfig) -> Self {
		Self { config, status_sink: None, running: None }
	}

	/// Send one [`SortEvent`] per processed arrival to `sink`
	pub fn with_status_sink(mut self, sink: tokio_mpsc::UnboundedSender<SortEvent>) -> Self {
		self.status_sink = Some(sink);
		self
	}

	/// Replace the status sink with a fresh channel and return its receiver
	///
	/// Takes effect on the next `start`.
	pub fn subscribe(&mut self) -> tokio_mpsc::UnboundedReceiver<SortEvent> {
		let (tx, rx) = tokio_mpsc::unbounded_channel();
		self.status_sink = Some(tx);
		rx
	}

	pub async fn start(
		&mut self, target: WatchTarget, provider: Arc<dyn RuleProvider>,
	) -> Result<SessionState> {
		if let Some(running) = &self.running {
			debug!("Session already watching {:?}", running.target.root);
			return Ok(SessionState::Running);
		}

		self.config
			.validate()
			.map_err(|reason| SorterError::configuration_error("sorter_config", &reason))?;

		if target.recursive {
			return Err(SorterError::configuration_error(
				"recursive",
				"only the watch root itself can be watched",
			));
		}

		if !target.root.is_dir() {
			return Err(SorterError::invalid_path(&target.root));
		}

		let (notify_tx, notify_rx) = mpsc::channel();
		let mut watcher = RecommendedWatcher::new(notify_tx, Config::default())?;
		watcher.watch(&target.root, RecursiveMode::NonRecursive)?;

		let (intake_tx, intake_rx) = tokio_mpsc::unbounded_channel();
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let in_flight = InFlight::default();

		// notify delivers on a std channel, so the bridge needs a blocking thread
		let bridge_intake = intake_tx.clone();
		let include_renames = self.config.include_renames;
		tokio::task::spawn_blocking(move || {
			forward_notify_events(notify_rx, bridge_intake, include_renames)
		});

		let pipeline = Arc::new(ArrivalPipeline::new(&self.config, provider));
		let dispatcher = tokio::spawn(dispatch(
			intake_rx,
			shutdown_rx,
			pipeline,
			Arc::clone(&in_flight),
			self.status_sink.clone(),
		));

		info!("👀 WATCHING: {} (renames: {})", target.root.display(), include_renames);

		self.running = Some(RunningSession {
			target,
			watcher,
			intake: intake_tx,
			shutdown: shutdown_tx,
			dispatcher,
			in_flight,
		});
		Ok(SessionState::Running)
	}

	/// Stop watching and wait for every in-flight arrival to finish
	pub async fn stop(&mut self) -> Result<SessionState> {
		let Some(running) = self.running.take() else {
			return Ok(SessionState::Stopped);
		};

		let RunningSession { target, mut watcher, intake, shutdown, dispatcher, .. } = running;

		if let Err(e) = watcher.unwatch(&target.root) {
			warn!("Failed to unwatch {:?}: {}", target.root, e);
		}
		drop(watcher);
		drop(intake);

		// The dispatcher may already be gone if it panicked
		let _ = shutdown.send(());
		let drained = dispatcher.await;
		info!("🛑 STOPPED: {}", target.root.display());

		if let Err(e) = drained {
			error!("Dispatch loop for {:?} ended abnormally: {}", target.root, e);
			return Err(SortError::TaskFailed { details: e.to_string() }.into());
		}
		Ok(SessionState::Stopped)
	}

	pub fn state(&self) -> SessionState {
		if self.running.is_some() {
			SessionState::Running
		} else {
			SessionState::Stopped
		}
	}

	/// Number of arrivals currently being processed
	pub fn in_flight(&self) -> usize {
		self.running
			.as_ref()
			.map(|running| running.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len())
			.unwrap_or(0)
	}

	/// Get a clone of the intake sender for arrivals discovered by other means
	pub fn arrival_sender(&self) -> Option<tokio_mpsc::UnboundedSender<PathBuf>> {
		self.running.as_ref().map(|running| running.intake.clone())
	}

	/// Queue `path` as if the watcher had reported it
	pub fn notify_arrival(&self, path: impl Into<PathBuf>) -> Result<()> {
		let running = self.running.as_ref().ok_or(SorterError::NotRunning)?;
		running.intake.send(path.into()).map_err(|_| SorterError::ChannelSend)
	}

	pub fn target(&self) -> Option<&WatchTarget> {
		self.running.as_ref().map(|running| &running.target)
	}
}

fn forward_notify_events(
	notify_rx: mpsc::Receiver<notify::Result<Event>>,
	intake: tokio_mpsc::UnboundedSender<PathBuf>, include_renames: bool,
) {
	for result in notify_rx {
		match result {
			Ok(event) => {
				debug!("Received notify event: {:?}", event);

				let paths = match ArrivalKind::from(event.kind) {
					ArrivalKind::Created => event.paths,
					// Both-ended renames carry the new name last
					ArrivalKind::RenamedIn if include_renames => {
						event.paths.into_iter().last().into_iter().collect()
					}
					_ => continue,
				};

				for path in paths {
					if intake.send(path).is_err() {
						debug!("Dispatcher is gone, closing notify bridge");
						return;
					}
				}
			}
			Err(e) => {
				error!("Notify error: {}", e);
			}
		}
	}
}

async fn dispatch(
	mut intake: tokio_mpsc::UnboundedReceiver<PathBuf>, mut shutdown: oneshot::Receiver<()>,
	pipeline: Arc<ArrivalPipeline>, in_flight: InFlight,
	sink: Option<tokio_mpsc::UnboundedSender<SortEvent>>,
) {
	let mut tasks = JoinSet::new();
	debug!("Dispatch loop started");

	loop {
		tokio::select! {
			_ = &mut shutdown => break,
			Some(path) = intake.recv() => {
				if path.is_dir() {
					debug!("Ignoring directory {:?}", path);
					continue;
				}

				let Some(guard) = InFlightGuard::claim(&in_flight, &path) else {
					debug!("Already processing {:?}, ignoring duplicate event", path);
					continue;
				};

				info!("📥 ARRIVAL: {}", path.display());
				let pipeline = Arc::clone(&pipeline);
				let sink = sink.clone();
				tasks.spawn(async move {
					let _guard = guard;
					let event = pipeline.process(&path).await;
					report(&event, sink.as_ref());
				});
			}
			Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_task_result(joined),
			else => break,
		}
	}

	if !tasks.is_empty() {
		info!("Waiting for {} in-flight arrival(s)", tasks.len());
	}
	while let Some(joined) = tasks.join_next().await {
		log_task_result(joined);
	}
	debug!("Dispatch loop ended");
}

fn report(event: &SortEvent, sink: Option<&tokio_mpsc::UnboundedSender<SortEvent>>) {
	if let Ok(json) = event.to_json() {
		debug!("Sort event JSON: {}", json);
	}

	if let Some(sink) = sink {
		if sink.send(event.clone()).is_err() {
			debug!("Status sink closed, dropping event for {:?}", event.source);
		}
	}
}

fn log_task_result(joined: std::result::Result<(), JoinError>) {
	if let Err(e) = joined {
		error!("Arrival task failed: {}", e);
	}
}
