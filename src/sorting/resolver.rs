use std::path::{Path, PathBuf};

/// Pick a path inside `dir` named after `file_name` that does not exist yet
///
/// Occupied names get a counter before the extension: `report.txt`,
/// `report_1.txt`, `report_2.txt`, ... The result is not reserved; the move
/// must still cope with the name being taken in the meantime.
pub fn resolve_destination(dir: &Path, file_name: &str) -> PathBuf {
	let candidate = dir.join(file_name);
	if !is_occupied(&candidate) {
		return candidate;
	}

	let (stem, extension) = split_extension(file_name);
	let mut counter: u64 = 1;
	loop {
		let name = match extension {
			Some(extension) => format!("{stem}_{counter}.{extension}"),
			None => format!("{stem}_{counter}"),
		};
		let candidate = dir.join(name);
		if !is_occupied(&candidate) {
			return candidate;
		}
		counter += 1;
	}
}

/// Whether anything, including a dangling symlink, already sits at `path`
pub fn is_occupied(path: &Path) -> bool {
	std::fs::symlink_metadata(path).is_ok()
}

/// Split on the last dot that is not the leading character
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
	match file_name.rfind('.') {
		Some(0) | None => (file_name, None),
		Some(dot) => (&file_name[..dot], Some(&file_name[dot + 1..])),
	}
}
