use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Polling behaviour for asynchronous generation jobs.
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    /// Consecutive transport failures tolerated before the job fails
    pub max_failures: u32,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(2000),
            max_interval: Duration::from_millis(10_000),
            backoff: 1.5,
            max_failures: 3,
            max_attempts: 300,
        }
    }
}

impl PollConfig {
    /// Grow `current` by the backoff factor, never past `max_interval`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let factor = if valid_backoff(self.backoff) {
            self.backoff
        } else {
            1.0
        };
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .map(|next| next.min(self.max_interval))
            .unwrap_or(self.max_interval)
    }
}

fn valid_backoff(factor: f64) -> bool {
    factor.is_finite() && factor >= 1.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersistenceConfig {
    pub debounce: Duration,
    pub data_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            data_dir: PathBuf::from(".mediagraph"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileConfig {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub page_size: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            batch_pause: Duration::from_millis(250),
            page_size: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub external_project_id: Option<String>,
    pub request_timeout: Duration,
}

/// Runtime configuration loaded from environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct MediagraphConfig {
    pub provider: ProviderConfig,
    pub poll: PollConfig,
    pub persistence: PersistenceConfig,
    pub reconcile: ReconcileConfig,
}

impl Default for MediagraphConfig {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl MediagraphConfig {
    pub fn from_env() -> Self {
        let mut values = HashMap::new();
        for (key, default) in Self::tracked_keys() {
            let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
            values.insert(key.to_string(), value);
        }
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Self {
        fn read(values: &HashMap<String, String>, key: &str, default: &str) -> String {
            values
                .get(key)
                .cloned()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        fn optional(values: &HashMap<String, String>, key: &str) -> Option<String> {
            values
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }

        fn number<T: std::str::FromStr>(
            values: &HashMap<String, String>,
            key: &str,
            default: T,
        ) -> T {
            values
                .get(key)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(default)
        }

        let poll_defaults = PollConfig::default();
        let reconcile_defaults = ReconcileConfig::default();

        let provider = ProviderConfig {
            base_url: read(values, "MEDIAGRAPH_PROVIDER_URL", "http://127.0.0.1:8080"),
            api_key: optional(values, "MEDIAGRAPH_API_KEY"),
            external_project_id: optional(values, "MEDIAGRAPH_EXTERNAL_PROJECT_ID"),
            request_timeout: Duration::from_secs(number(
                values,
                "MEDIAGRAPH_REQUEST_TIMEOUT_SECS",
                60,
            )),
        };

        let poll = PollConfig {
            initial_interval: Duration::from_millis(number(
                values,
                "MEDIAGRAPH_POLL_INTERVAL_MS",
                2000,
            )),
            max_interval: Duration::from_millis(number(
                values,
                "MEDIAGRAPH_POLL_MAX_INTERVAL_MS",
                10_000,
            )),
            backoff: Some(number(values, "MEDIAGRAPH_POLL_BACKOFF", poll_defaults.backoff))
                .filter(|factor| valid_backoff(*factor))
                .unwrap_or(poll_defaults.backoff),
            max_failures: number(
                values,
                "MEDIAGRAPH_POLL_MAX_FAILURES",
                poll_defaults.max_failures,
            ),
            max_attempts: number(
                values,
                "MEDIAGRAPH_POLL_MAX_ATTEMPTS",
                poll_defaults.max_attempts,
            ),
        };

        let persistence = PersistenceConfig {
            debounce: Duration::from_millis(number(values, "MEDIAGRAPH_SAVE_DEBOUNCE_MS", 2000)),
            data_dir: PathBuf::from(read(values, "MEDIAGRAPH_DATA_DIR", ".mediagraph")),
        };

        let reconcile = ReconcileConfig {
            batch_size: number(
                values,
                "MEDIAGRAPH_RECONCILE_BATCH",
                reconcile_defaults.batch_size,
            )
            .max(1),
            batch_pause: Duration::from_millis(number(
                values,
                "MEDIAGRAPH_RECONCILE_PAUSE_MS",
                250,
            )),
            page_size: number(
                values,
                "MEDIAGRAPH_LISTING_PAGE_SIZE",
                reconcile_defaults.page_size,
            )
            .max(1),
        };

        Self {
            provider,
            poll,
            persistence,
            reconcile,
        }
    }

    fn tracked_keys() -> Vec<(&'static str, &'static str)> {
        vec![
            ("MEDIAGRAPH_PROVIDER_URL", "http://127.0.0.1:8080"),
            ("MEDIAGRAPH_API_KEY", ""),
            ("MEDIAGRAPH_EXTERNAL_PROJECT_ID", ""),
            ("MEDIAGRAPH_REQUEST_TIMEOUT_SECS", "60"),
            ("MEDIAGRAPH_POLL_INTERVAL_MS", "2000"),
            ("MEDIAGRAPH_POLL_MAX_INTERVAL_MS", "10000"),
            ("MEDIAGRAPH_POLL_BACKOFF", "1.5"),
            ("MEDIAGRAPH_POLL_MAX_FAILURES", "3"),
            ("MEDIAGRAPH_POLL_MAX_ATTEMPTS", "300"),
            ("MEDIAGRAPH_SAVE_DEBOUNCE_MS", "2000"),
            ("MEDIAGRAPH_DATA_DIR", ".mediagraph"),
            ("MEDIAGRAPH_RECONCILE_BATCH", "4"),
            ("MEDIAGRAPH_RECONCILE_PAUSE_MS", "250"),
            ("MEDIAGRAPH_LISTING_PAGE_SIZE", "50"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_map() {
        let config = MediagraphConfig::from_map(&HashMap::new());
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.reconcile, ReconcileConfig::default());
        assert_eq!(config.persistence.debounce, Duration::from_secs(2));
        assert_eq!(config.provider.api_key, None);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let mut values = HashMap::new();
        values.insert("MEDIAGRAPH_POLL_INTERVAL_MS".to_string(), "500".to_string());
        values.insert("MEDIAGRAPH_POLL_MAX_FAILURES".to_string(), "nope".to_string());
        values.insert("MEDIAGRAPH_RECONCILE_BATCH".to_string(), "0".to_string());
        values.insert("MEDIAGRAPH_API_KEY".to_string(), "  ".to_string());

        let config = MediagraphConfig::from_map(&values);
        assert_eq!(config.poll.initial_interval, Duration::from_millis(500));
        assert_eq!(config.poll.max_failures, 3);
        assert_eq!(config.reconcile.batch_size, 1);
        assert_eq!(config.provider.api_key, None);
    }

    #[test]
    fn test_backoff_is_capped() {
        let poll = PollConfig {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(200),
            backoff: 2.0,
            ..PollConfig::default()
        };
        let second = poll.next_interval(poll.initial_interval);
        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(poll.next_interval(second), Duration::from_millis(200));
    }

    #[test]
    fn test_huge_backoff_stops_at_ceiling() {
        let poll = PollConfig {
            backoff: 1e20,
            ..PollConfig::default()
        };
        assert_eq!(poll.next_interval(Duration::from_secs(2)), poll.max_interval);
        assert_eq!(poll.next_interval(Duration::MAX), poll.max_interval);
    }

    #[test]
    fn test_unusable_backoff_falls_back_to_default() {
        for raw in ["0", "-2", "0.5", "NaN", "inf"] {
            let mut values = HashMap::new();
            values.insert("MEDIAGRAPH_POLL_BACKOFF".to_string(), raw.to_string());
            let config = MediagraphConfig::from_map(&values);
            assert_eq!(config.poll.backoff, 1.5, "backoff {}", raw);
        }

        let poll = PollConfig {
            backoff: 0.0,
            ..PollConfig::default()
        };
        assert_eq!(
            poll.next_interval(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }
}
