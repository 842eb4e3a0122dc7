use std::time::Duration;

/// Timing and behaviour settings for a sorting session
#[derive(Debug, Clone)]
pub struct SorterConfig {
	/// Longest time to wait for a file to stop changing
	pub stability_timeout: Duration,
	/// Delay between two size samples
	pub poll_interval: Duration,
	/// Pause between a positive stability check and the move
	pub settle_delay: Duration,
	/// Checksum cross-volume copies before removing the source
	pub verify_copies: bool,
	/// Drop the leading tag from the name used at the destination
	pub strip_tag: bool,
	/// Treat files renamed into the watch root as arrivals
	pub include_renames: bool,
}

impl Default for SorterConfig {
	fn default() -> Self {
		Self::scaled(Duration::from_secs(1))
	}
}

impl SorterConfig {
	/// Build the default configuration expressed in multiples of `unit`
	///
	/// The defaults are a 30 unit timeout, a 1 unit poll interval and a 1 unit
	/// settle delay.
	pub fn scaled(unit: Duration) -> Self {
		Self {
			stability_timeout: unit * 30,
			poll_interval: unit,
			settle_delay: unit,
			verify_copies: true,
			strip_tag: true,
			include_renames: false,
		}
	}

	/// Validate the configuration and return errors if invalid
	pub fn validate(&self) -> Result<(), String> {
		if self.poll_interval.is_zero() {
			return Err("poll_interval must be greater than 0".to_string());
		}

		if self.stability_timeout < self.poll_interval * 2 {
			return Err(format!(
				"stability_timeout ({:?}) must allow at least two samples at poll_interval ({:?})",
				self.stability_timeout, self.poll_interval
			));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_timings() {
		let config = SorterConfig::default();
		assert_eq!(config.stability_timeout, Duration::from_secs(30));
		assert_eq!(config.poll_interval, Duration::from_secs(1));
		assert_eq!(config.settle_delay, Duration::from_secs(1));
		assert!(config.verify_copies);
		assert!(config.strip_tag);
		assert!(!config.include_renames);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_scaled_keeps_ratios() {
		let config = SorterConfig::scaled(Duration::from_millis(10));
		assert_eq!(config.stability_timeout, Duration::from_millis(300));
		assert_eq!(config.poll_interval, Duration::from_millis(10));
		assert_eq!(config.settle_delay, Duration::from_millis(10));
	}

	#[test]
	fn test_config_validation() {
		let mut config = SorterConfig::default();

		config.poll_interval = Duration::ZERO;
		assert!(config.validate().is_err());

		config.poll_interval = Duration::from_secs(1);
		config.stability_timeout = Duration::from_secs(1);
		assert!(config.validate().is_err());

		config.stability_timeout = Duration::from_secs(2);
		assert!(config.validate().is_ok());
	}
}
