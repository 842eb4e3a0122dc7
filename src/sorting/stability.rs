//! Arrival stability detection
//!
//! A file is considered to have finished arriving once two consecutive size
//! samples agree and the file can be opened and share-locked, meaning the
//! producer released it. Sampling is bounded by a timeout.

use crate::sorting::config::SorterConfig;
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// File-system observations used by the detector
pub trait FileProbe: Send + Sync {
	/// Current size of the file at `path`
	fn size(&self, path: &Path) -> io::Result<u64>;

	/// Whether no other process holds the file in a way that blocks a shared read
	fn is_released(&self, path: &Path) -> bool;
}

/// Probe backed by the real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl FileProbe for FsProbe {
	fn size(&self, path: &Path) -> io::Result<u64> {
		std::fs::metadata(path).map(|metadata| metadata.len())
	}

	fn is_released(&self, path: &Path) -> bool {
		// Windows reports sharing violations at open time
		let file = match File::open(path) {
			Ok(file) => file,
			Err(e) => {
				debug!("Cannot open {:?} for reading yet: {}", path, e);
				return false;
			}
		};

		match FileExt::try_lock_shared(&file) {
			Ok(()) => {
				let _ = FileExt::unlock(&file);
				true
			}
			Err(e) if is_lock_contention(&e) => {
				debug!("{:?} is still locked by another process", path);
				false
			}
			Err(e) => {
				// Locking unsupported on this file system; the open succeeded
				debug!("Shared lock unavailable for {:?}: {}", path, e);
				true
			}
		}
	}
}

fn is_lock_contention(err: &io::Error) -> bool {
	err.kind() == io::ErrorKind::WouldBlock
		|| (err.raw_os_error().is_some()
			&& err.raw_os_error() == fs2::lock_contended_error().raw_os_error())
}

/// Final verdict of a stability wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
	Stable { size: u64 },
	TimedOut { last_size: Option<u64> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityReport {
	pub stability: Stability,
	/// Number of size samples taken
	pub samples: u32,
	/// Total time spent waiting between samples
	pub waited: Duration,
}

impl StabilityReport {
	pub fn is_stable(&self) -> bool {
		matches!(self.stability, Stability::Stable { .. })
	}
}

/// Per-path state while a stability check is running
#[derive(Debug)]
struct PendingArrival {
	path: PathBuf,
	last_observed_size: Option<u64>,
	elapsed: Duration,
	samples: u32,
}

impl PendingArrival {
	fn new(path: &Path) -> Self {
		Self {
			path: path.to_path_buf(),
			last_observed_size: None,
			elapsed: Duration::ZERO,
			samples: 0,
		}
	}

	fn finish(self, stability: Stability) -> StabilityReport {
		StabilityReport { stability, samples: self.samples, waited: self.elapsed }
	}
}

pub struct StabilityDetector {
	probe: Arc<dyn FileProbe>,
	timeout: Duration,
	poll_interval: Duration,
}

impl StabilityDetector {
	pub fn new(config: &SorterConfig) -> Self {
		Self::with_probe(config, Arc::new(FsProbe))
	}

	pub fn with_probe(config: &SorterConfig, probe: Arc<dyn FileProbe>) -> Self {
		Self {
			probe,
			timeout: config.stability_timeout,
			poll_interval: config.poll_interval,
		}
	}

	/// Poll `path` until it is stable or the timeout is used up
	///
	/// Suspends the calling task for up to the full timeout.
	pub async fn wait_until_stable(&self, path: &Path) -> StabilityReport {
		let mut pending = PendingArrival::new(path);

		while pending.elapsed < self.timeout {
			pending.samples += 1;

			match self.probe.size(&pending.path) {
				Ok(size) => {
					if pending.last_observed_size == Some(size) {
						if self.probe.is_released(&pending.path) {
							debug!(
								"{:?} stable at {} bytes after {} samples",
								pending.path, size, pending.samples
							);
							return pending.finish(Stability::Stable { size });
						}
					} else {
						debug!(
							"{:?} size {:?} -> {}",
							pending.path, pending.last_observed_size, size
						);
					}
					pending.last_observed_size = Some(size);
				}
				Err(e) if e.kind() == io::ErrorKind::NotFound => {
					debug!("{:?} not present yet", pending.path);
				}
				Err(e) => {
					debug!("Transient error sampling {:?}: {}", pending.path, e);
				}
			}

			tokio::time::sleep(self.poll_interval).await;
			pending.elapsed += self.poll_interval;
		}

		warn!(
			"Timeout: {:?} did not settle within {:?} (last size: {:?})",
			pending.path, self.timeout, pending.last_observed_size
		);
		let last_size = pending.last_observed_size;
		pending.finish(Stability::TimedOut { last_size })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
	use std::sync::Mutex;
	use tempfile::TempDir;

	/// Replays a fixed list of sizes, repeating the last one forever
	struct ScriptedProbe {
		sizes: Vec<io::Result<u64>>,
		next: AtomicUsize,
		locked_checks: AtomicU32,
		release_checks: AtomicU32,
	}

	impl ScriptedProbe {
		fn new(sizes: Vec<io::Result<u64>>) -> Self {
			Self {
				sizes,
				next: AtomicUsize::new(0),
				locked_checks: AtomicU32::new(0),
				release_checks: AtomicU32::new(0),
			}
		}

		fn sizes(sizes: &[u64]) -> Self {
			Self::new(sizes.iter().map(|size| Ok(*size)).collect())
		}

		fn locked_for(self, checks: u32) -> Self {
			self.locked_checks.store(checks, Ordering::SeqCst);
			self
		}
	}

	impl FileProbe for ScriptedProbe {
		fn size(&self, _path: &Path) -> io::Result<u64> {
			let index = self.next.fetch_add(1, Ordering::SeqCst).min(self.sizes.len() - 1);
			match &self.sizes[index] {
				Ok(size) => Ok(*size),
				Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
			}
		}

		fn is_released(&self, _path: &Path) -> bool {
			self.release_checks.fetch_add(1, Ordering::SeqCst);
			let remaining = self.locked_checks.load(Ordering::SeqCst);
			if remaining > 0 {
				self.locked_checks.store(remaining - 1, Ordering::SeqCst);
				false
			} else {
				true
			}
		}
	}

	/// Grows by one byte on every sample
	struct GrowingProbe {
		size: Mutex<u64>,
	}

	impl FileProbe for GrowingProbe {
		fn size(&self, _path: &Path) -> io::Result<u64> {
			let mut size = self.size.lock().unwrap();
			*size += 1;
			Ok(*size)
		}

		fn is_released(&self, _path: &Path) -> bool {
			true
		}
	}

	fn fast_config(timeout_units: u32) -> SorterConfig {
		let mut config = SorterConfig::scaled(Duration::from_millis(2));
		config.stability_timeout = config.poll_interval * timeout_units;
		config
	}

	fn detector(probe: impl FileProbe + 'static, timeout_units: u32) -> StabilityDetector {
		StabilityDetector::with_probe(&fast_config(timeout_units), Arc::new(probe))
	}

	#[tokio::test]
	async fn test_single_burst_is_stable_on_second_sample() {
		let detector = detector(ScriptedProbe::sizes(&[42]), 30);
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert_eq!(report.stability, Stability::Stable { size: 42 });
		assert_eq!(report.samples, 2);
		assert_eq!(report.waited, Duration::from_millis(2));
	}

	#[tokio::test]
	async fn test_growing_file_is_stable_at_n_plus_two() {
		// Grows for 3 intervals, then holds at 4 bytes
		let detector = detector(ScriptedProbe::sizes(&[1, 2, 3, 4]), 30);
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert_eq!(report.stability, Stability::Stable { size: 4 });
		assert_eq!(report.samples, 3 + 2);
	}

	#[tokio::test]
	async fn test_zero_byte_first_sample_is_not_stable() {
		let detector = detector(ScriptedProbe::sizes(&[0, 10]), 30);
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert_eq!(report.stability, Stability::Stable { size: 10 });
		assert_eq!(report.samples, 3);
	}

	#[tokio::test]
	async fn test_missing_then_present() {
		let not_found = || Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
		let probe = ScriptedProbe::new(vec![not_found(), not_found(), Ok(7)]);
		let detector = detector(probe, 30);
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert_eq!(report.stability, Stability::Stable { size: 7 });
		assert_eq!(report.samples, 4);
	}

	#[tokio::test]
	async fn test_locked_file_keeps_waiting() {
		let probe = Arc::new(ScriptedProbe::sizes(&[5]).locked_for(2));
		let detector = StabilityDetector::with_probe(&fast_config(30), probe.clone());
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert!(report.is_stable());
		assert_eq!(report.samples, 4);
		assert_eq!(probe.release_checks.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_never_stable_times_out_once() {
		let detector = detector(GrowingProbe { size: Mutex::new(0) }, 5);
		let report = detector.wait_until_stable(Path::new("/in/a.pdf")).await;

		assert_eq!(report.stability, Stability::TimedOut { last_size: Some(5) });
		assert_eq!(report.samples, 5);
		assert_eq!(report.waited, Duration::from_millis(10));
	}

	#[tokio::test]
	async fn test_real_file_is_stable() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("download.bin");
		std::fs::write(&path, vec![7u8; 4096]).unwrap();

		let detector = StabilityDetector::new(&fast_config(50));
		let report = detector.wait_until_stable(&path).await;
		assert_eq!(report.stability, Stability::Stable { size: 4096 });
	}

	#[tokio::test]
	async fn test_real_missing_file_times_out() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("never.bin");

		let detector = StabilityDetector::new(&fast_config(5));
		let report = detector.wait_until_stable(&path).await;
		assert_eq!(report.stability, Stability::TimedOut { last_size: None });
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_exclusive_lock_blocks_stability() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("held.bin");
		std::fs::write(&path, b"partial").unwrap();

		let holder = File::open(&path).unwrap();
		FileExt::lock_exclusive(&holder).unwrap();

		let detector = StabilityDetector::new(&fast_config(5));
		let report = detector.wait_until_stable(&path).await;
		assert!(!report.is_stable());

		FileExt::unlock(&holder).unwrap();
		let report = detector.wait_until_stable(&path).await;
		assert!(report.is_stable());
	}
}
