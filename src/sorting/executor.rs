//! File relocation
//!
//! On one volume the file is hard-linked into place and the source unlinked,
//! so an occupant that appears at the destination is never replaced. Volumes
//! without hard links fall back to a plain rename. Across volumes the file is
//! copied and the source removed afterwards. A failed copy never leaves
//! anything at the destination and never touches the source.

use crate::sorting::config::SorterConfig;
use crate::sorting::error::SortError;
use crate::sorting::resolver::is_occupied;
use std::fs::{self, File, OpenOptions};
use std::hash::Hasher;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use twox_hash::XxHash64;

#[cfg(unix)]
const CROSS_DEVICE_ERROR: Option<i32> = Some(18); // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_ERROR: Option<i32> = Some(17); // ERROR_NOT_SAME_DEVICE
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_ERROR: Option<i32> = None;

#[cfg(target_os = "linux")]
const LINK_UNSUPPORTED_ERROR: Option<i32> = Some(95); // EOPNOTSUPP
#[cfg(windows)]
const LINK_UNSUPPORTED_ERROR: Option<i32> = Some(1); // ERROR_INVALID_FUNCTION
#[cfg(not(any(target_os = "linux", windows)))]
const LINK_UNSUPPORTED_ERROR: Option<i32> = None;

const CHECKSUM_BUFFER_SIZE: usize = 64 * 1024;

/// How a file reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
	Renamed,
	Copied { bytes: u64 },
}

/// Raw file-system primitives used by the executor
pub trait Transport: Send + Sync {
	/// Make `from` reachable at `to`, failing with `AlreadyExists` if `to` is taken
	fn link(&self, from: &Path, to: &Path) -> io::Result<()>;

	/// Used only where the file system has no hard links
	fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

	fn copy_contents(&self, reader: &mut File, writer: &mut File) -> io::Result<u64> {
		io::copy(reader, writer)
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsTransport;

impl Transport for FsTransport {
	fn link(&self, from: &Path, to: &Path) -> io::Result<()> {
		fs::hard_link(from, to)
	}

	fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
		fs::rename(from, to)
	}
}

pub struct MoveExecutor {
	transport: Arc<dyn Transport>,
	settle_delay: Duration,
	verify_copies: bool,
}

impl MoveExecutor {
	pub fn new(config: &SorterConfig) -> Self {
		Self::with_transport(config, Arc::new(FsTransport))
	}

	pub fn with_transport(config: &SorterConfig, transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			settle_delay: config.settle_delay,
			verify_copies: config.verify_copies,
		}
	}

	/// Move `source` to the already resolved `destination`
	///
	/// Waits the settle delay first. Fails with [`SortError::CollisionRace`]
	/// when the destination is occupied by the time the move runs.
	pub async fn execute(&self, source: &Path, destination: &Path) -> Result<MoveMethod, SortError> {
		tokio::time::sleep(self.settle_delay).await;

		let transport = Arc::clone(&self.transport);
		let verify = self.verify_copies;
		let source: PathBuf = source.to_path_buf();
		let destination: PathBuf = destination.to_path_buf();

		tokio::task::spawn_blocking(move || {
			relocate(transport.as_ref(), &source, &destination, verify)
		})
		.await
		.map_err(|e| SortError::TaskFailed { details: e.to_string() })?
	}
}

fn relocate(
	transport: &dyn Transport, source: &Path, destination: &Path, verify: bool,
) -> Result<MoveMethod, SortError> {
	let metadata = fs::metadata(source)
		.map_err(|e| SortError::invalid_source(source, &e.to_string()))?;
	if !metadata.is_file() {
		return Err(SortError::invalid_source(source, "not a regular file"));
	}

	if is_occupied(destination) {
		return Err(SortError::collision_race(destination));
	}

	match transport.link(source, destination) {
		Ok(()) => unlink_source(source, destination),
		Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
			Err(SortError::collision_race(destination))
		}
		Err(e) if is_cross_device(&e) => {
			debug!(
				"Link {:?} -> {:?} crosses devices, copying instead",
				source, destination
			);
			copy_then_remove(transport, source, destination, verify)
		}
		Err(e) if links_unsupported(&e) => {
			debug!("No hard links for {:?} ({}), renaming instead", destination, e);
			rename_into_place(transport, source, destination, verify)
		}
		Err(e) => Err(SortError::rename_failed(source, destination, &e)),
	}
}

/// Drop the source name once the destination link exists
fn unlink_source(source: &Path, destination: &Path) -> Result<MoveMethod, SortError> {
	if let Err(e) = fs::remove_file(source) {
		// Keep a single name: the source stays authoritative
		discard_partial(destination);
		return Err(SortError::source_removal_failed(source, &e));
	}
	Ok(MoveMethod::Renamed)
}

fn rename_into_place(
	transport: &dyn Transport, source: &Path, destination: &Path, verify: bool,
) -> Result<MoveMethod, SortError> {
	// rename replaces an existing target; this re-check is the only guard left here
	if is_occupied(destination) {
		return Err(SortError::collision_race(destination));
	}

	match transport.rename(source, destination) {
		Ok(()) => Ok(MoveMethod::Renamed),
		Err(e) if is_cross_device(&e) => copy_then_remove(transport, source, destination, verify),
		Err(e) => Err(SortError::rename_failed(source, destination, &e)),
	}
}

fn links_unsupported(err: &io::Error) -> bool {
	matches!(err.kind(), io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied)
		|| (LINK_UNSUPPORTED_ERROR.is_some() && err.raw_os_error() == LINK_UNSUPPORTED_ERROR)
}

fn is_cross_device(err: &io::Error) -> bool {
	CROSS_DEVICE_ERROR.is_some() && err.raw_os_error() == CROSS_DEVICE_ERROR
}

fn copy_then_remove(
	transport: &dyn Transport, source: &Path, destination: &Path, verify: bool,
) -> Result<MoveMethod, SortError> {
	let mut reader =
		File::open(source).map_err(|e| SortError::copy_failed(source, destination, &e))?;

	let mut writer = match OpenOptions::new().write(true).create_new(true).open(destination) {
		Ok(writer) => writer,
		Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
			return Err(SortError::collision_race(destination));
		}
		Err(e) => return Err(SortError::copy_failed(source, destination, &e)),
	};

	let copied = transfer(transport, &mut reader, &mut writer, source, destination, verify);
	drop(writer);
	drop(reader);

	let bytes = match copied {
		Ok(bytes) => bytes,
		Err(e) => {
			discard_partial(destination);
			return Err(e);
		}
	};

	if let Err(e) = fs::remove_file(source) {
		// Keep a single copy: the source stays authoritative
		discard_partial(destination);
		return Err(SortError::source_removal_failed(source, &e));
	}

	Ok(MoveMethod::Copied { bytes })
}

fn transfer(
	transport: &dyn Transport, reader: &mut File, writer: &mut File, source: &Path,
	destination: &Path, verify: bool,
) -> Result<u64, SortError> {
	let bytes = transport
		.copy_contents(reader, writer)
		.map_err(|e| SortError::copy_failed(source, destination, &e))?;
	writer.sync_all().map_err(|e| SortError::copy_failed(source, destination, &e))?;

	let source_metadata =
		reader.metadata().map_err(|e| SortError::copy_failed(source, destination, &e))?;
	if bytes != source_metadata.len() {
		return Err(SortError::verification_failed(
			source,
			destination,
			&format!("copied {} of {} bytes", bytes, source_metadata.len()),
		));
	}

	if verify {
		let expected =
			checksum(source).map_err(|e| SortError::copy_failed(source, destination, &e))?;
		let actual =
			checksum(destination).map_err(|e| SortError::copy_failed(source, destination, &e))?;
		if expected != actual {
			return Err(SortError::verification_failed(
				source,
				destination,
				&format!("checksum {expected:x} != {actual:x}"),
			));
		}
	}

	if let Err(e) = fs::set_permissions(destination, source_metadata.permissions()) {
		debug!("Could not copy permissions to {:?}: {}", destination, e);
	}

	Ok(bytes)
}

fn checksum(path: &Path) -> io::Result<u64> {
	let mut file = File::open(path)?;
	let mut hasher = XxHash64::with_seed(0);
	let mut buffer = vec![0u8; CHECKSUM_BUFFER_SIZE];
	loop {
		let read = file.read(&mut buffer)?;
		if read == 0 {
			break;
		}
		hasher.write(&buffer[..read]);
	}
	Ok(hasher.finish())
}

fn discard_partial(destination: &Path) {
	if let Err(e) = fs::remove_file(destination) {
		if e.kind() != io::ErrorKind::NotFound {
			warn!("Failed to remove partial copy {:?}: {}", destination, e);
		}
	}
}
