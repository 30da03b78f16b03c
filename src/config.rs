use std::time::Duration;

use serde::Deserialize;

use crate::utils;

const DEFAULT_CONFIG: &str = include_str!("../.config/feed.json5");

/// Tunable thresholds for the feed engine.
///
/// The defaults reproduce the behavior of the chat clients this engine was
/// distilled from, but none of them is a hard requirement — hosts override
/// them via [`FeedConfig::load`] (config files) or struct update syntax.
/// Durations are stored as milliseconds so the config file stays flat.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: usize,
    pub min_fetch_interval_ms: u64,
    pub empty_page_cooldown_ms: u64,
    pub fetch_watchdog_ms: u64,
    pub scroll_verify_backoff_ms: Vec<u64>,
    pub highlight_duration_ms: u64,
    pub protection_duration_ms: u64,
    pub protection_fallback_ms: u64,
    pub ack_throttle_ms: u64,
    pub ack_throttle_max_ms: u64,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub max_ack_attempts: u32,
    pub min_autoscroll_len: usize,
    pub near_bottom_slack: f32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            min_fetch_interval_ms: 3_000,
            empty_page_cooldown_ms: 10_000,
            fetch_watchdog_ms: 15_000,
            scroll_verify_backoff_ms: vec![200, 400, 600],
            highlight_duration_ms: 10_000,
            protection_duration_ms: 5_000,
            protection_fallback_ms: 300_000,
            ack_throttle_ms: 5_000,
            ack_throttle_max_ms: 60_000,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            max_ack_attempts: 5,
            min_autoscroll_len: 12,
            near_bottom_slack: 1.0,
        }
    }
}

impl FeedConfig {
    /// Load configuration: embedded defaults layered under optional user
    /// config files (`feed.json5`/`feed.json`/`feed.yaml`/`feed.toml` in
    /// the config dir). Missing user files are fine; the embedded defaults
    /// always apply.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_dir = utils::get_config_dir();
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Json5,
        ));

        let config_files = [
            ("feed.json5", config::FileFormat::Json5),
            ("feed.json", config::FileFormat::Json),
            ("feed.yaml", config::FileFormat::Yaml),
            ("feed.toml", config::FileFormat::Toml),
        ];
        for (file, format) in &config_files {
            builder = builder.add_source(
                config::File::from(config_dir.join(file))
                    .format(*format)
                    .required(false),
            );
        }

        builder.build()?.try_deserialize()
    }

    pub fn min_fetch_interval(&self) -> Duration {
        Duration::from_millis(self.min_fetch_interval_ms)
    }

    pub fn empty_page_cooldown(&self) -> Duration {
        Duration::from_millis(self.empty_page_cooldown_ms)
    }

    pub fn fetch_watchdog(&self) -> Duration {
        Duration::from_millis(self.fetch_watchdog_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_duration_ms)
    }

    pub fn protection_duration(&self) -> Duration {
        Duration::from_millis(self.protection_duration_ms)
    }

    pub fn protection_fallback(&self) -> Duration {
        Duration::from_millis(self.protection_fallback_ms)
    }

    pub fn ack_throttle(&self) -> Duration {
        Duration::from_millis(self.ack_throttle_ms)
    }

    pub fn ack_throttle_max(&self) -> Duration {
        Duration::from_millis(self.ack_throttle_max_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        let embedded: FeedConfig = json5::from_str(DEFAULT_CONFIG).expect("embedded config parses");
        assert_eq!(embedded, FeedConfig::default());
    }

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.min_fetch_interval(), Duration::from_secs(3));
        assert_eq!(config.empty_page_cooldown(), Duration::from_secs(10));
        assert_eq!(config.fetch_watchdog(), Duration::from_secs(15));
        assert_eq!(config.protection_fallback(), Duration::from_secs(300));
        assert_eq!(config.scroll_verify_backoff_ms, vec![200, 400, 600]);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let parsed: FeedConfig = json5::from_str(r#"{ "page_size": 25 }"#).expect("valid");
        assert_eq!(parsed.page_size, 25);
        assert_eq!(parsed.min_autoscroll_len, 12);
    }
}
