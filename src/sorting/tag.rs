//! Routing tag extraction from file names
//!
//! A tag is a bracketed prefix anchored at the first character of the name,
//! for example `[Invoice] march.pdf`. Only the first `]` closes the tag and
//! the content may not span a line break.

/// Extract the leading tag of `file_name`, brackets included, lower-cased
pub fn extract_tag(file_name: &str) -> Option<String> {
	let (inner, _) = split_tag(file_name)?;
	Some(format!("[{}]", inner.to_lowercase()))
}

/// Name to use at the destination once the tag has been routed
///
/// Drops the tag and any whitespace that follows it. The original name is kept
/// when nothing but an extension (or nothing at all) would remain.
pub fn strip_tag(file_name: &str) -> &str {
	match split_tag(file_name) {
		Some((_, rest)) => {
			let rest = rest.trim_start();
			if rest.is_empty() || rest.starts_with('.') {
				file_name
			} else {
				rest
			}
		}
		None => file_name,
	}
}

fn split_tag(file_name: &str) -> Option<(&str, &str)> {
	let after_open = file_name.strip_prefix('[')?;
	let close = after_open.find(']')?;
	let inner = &after_open[..close];
	if inner.contains('\n') {
		return None;
	}
	Some((inner, &after_open[close + 1..]))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_extracts_leading_tag_lowercased() {
		assert_eq!(extract_tag("[Invoice] march.pdf"), Some("[invoice]".to_string()));
		assert_eq!(extract_tag("[INVOICE]march.pdf"), Some("[invoice]".to_string()));
		assert_eq!(extract_tag("[invoice]"), Some("[invoice]".to_string()));
	}

	#[test]
	fn test_no_tag() {
		assert_eq!(extract_tag("report.pdf"), None);
		assert_eq!(extract_tag(" [invoice] march.pdf"), None);
		assert_eq!(extract_tag("march [invoice].pdf"), None);
		assert_eq!(extract_tag("[unterminated.pdf"), None);
		assert_eq!(extract_tag(""), None);
	}

	#[test]
	fn test_first_closing_bracket_wins() {
		assert_eq!(extract_tag("[a]b]c.txt"), Some("[a]".to_string()));
		assert_eq!(extract_tag("[A][B] file.txt"), Some("[a]".to_string()));
	}

	#[test]
	fn test_edge_contents() {
		assert_eq!(extract_tag("[]empty.txt"), Some("[]".to_string()));
		assert_eq!(extract_tag("[Tax 2024] form.pdf"), Some("[tax 2024]".to_string()));
		assert_eq!(extract_tag("[a\nb] file.txt"), None);
		assert_eq!(extract_tag("[Ünïcode] file.txt"), Some("[ünïcode]".to_string()));
	}

	#[test]
	fn test_strip_tag() {
		assert_eq!(strip_tag("[Invoice] march.pdf"), "march.pdf");
		assert_eq!(strip_tag("[invoice]march.pdf"), "march.pdf");
		assert_eq!(strip_tag("report.pdf"), "report.pdf");
		assert_eq!(strip_tag("[invoice].pdf"), "[invoice].pdf");
		assert_eq!(strip_tag("[invoice]"), "[invoice]");
		assert_eq!(strip_tag("[invoice]   "), "[invoice]   ");
	}
}
