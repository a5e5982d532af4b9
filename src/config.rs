use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "HealthLab";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "healthlab=info"
}

/// Get the application data directory (~/HealthLab/ on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("HealthLab")
}

/// Database path: HEALTHLAB_DB override, else ~/HealthLab/healthlab.db.
pub fn database_path() -> PathBuf {
    std::env::var("HEALTHLAB_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| app_data_dir().join("healthlab.db"))
}

/// Runtime tunables, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Consecutive failed PIN attempts before a booking is locked out.
    pub lockout_threshold: u32,
    /// How long a lockout lasts once triggered.
    pub lockout_window: Duration,
    /// Time budget for one symptom-scoring pass.
    pub matcher_budget: Duration,
    pub max_suggestions: usize,
    /// Suggestions scoring below this are dropped.
    pub min_score: f32,
    /// Oldest turns beyond this cap are trimmed between conversations.
    pub max_turns_retained: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8000).into(),
            lockout_threshold: 5,
            lockout_window: Duration::from_secs(15 * 60),
            matcher_budget: Duration::from_millis(250),
            max_suggestions: 5,
            min_score: 0.2,
            max_turns_retained: 200,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from HEALTHLAB_* environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("HEALTHLAB_BIND", defaults.bind_addr),
            lockout_threshold: env_parse("HEALTHLAB_LOCKOUT_THRESHOLD", defaults.lockout_threshold),
            lockout_window: Duration::from_secs(env_parse(
                "HEALTHLAB_LOCKOUT_WINDOW_SECS",
                defaults.lockout_window.as_secs(),
            )),
            matcher_budget: Duration::from_millis(env_parse(
                "HEALTHLAB_MATCHER_BUDGET_MS",
                defaults.matcher_budget.as_millis() as u64,
            )),
            max_suggestions: env_parse("HEALTHLAB_MAX_SUGGESTIONS", defaults.max_suggestions),
            min_score: env_parse("HEALTHLAB_MIN_SCORE", defaults.min_score),
            max_turns_retained: env_parse("HEALTHLAB_MAX_TURNS", defaults.max_turns_retained),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("HealthLab"));
    }

    #[test]
    fn app_name_is_healthlab() {
        assert_eq!(APP_NAME, "HealthLab");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_lockout_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.lockout_threshold, 5);
        assert_eq!(cfg.lockout_window, Duration::from_secs(900));
    }

    #[test]
    fn default_matcher_limits() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.max_suggestions, 5);
        assert!(cfg.min_score > 0.0 && cfg.min_score < 1.0);
        assert!(cfg.matcher_budget < Duration::from_secs(1));
    }
}
