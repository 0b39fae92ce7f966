//! Session manager settings.
//!
//! # Design
//! Values come from `HABITICA_*` variables. `from_env` also reads a `.env`
//! file in the working directory; variables already set in the process
//! environment take precedence over the file. Parsing goes through
//! `from_lookup`, so tests never touch the process environment.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::types::CLIENT_SUFFIX;

const DEFAULT_API_DELAY_SECS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOGIN_ATTEMPTS: u32 = 3;
const DEFAULT_LOGIN_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("failed to read {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

/// Settings for the session manager.
///
/// Loaded from `HABITICA_*` environment variables by the process that owns
/// the manager; library users can build one with [`Config::new`].
#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Minimum spacing between API calls.
    pub api_delay: Duration,
    /// Per-request timeout, connect included.
    pub request_timeout: Duration,
    /// Upper bound on login attempts per credential fetch (at least 1).
    pub login_max_attempts: u32,
    /// Delay before the second login attempt; doubles for each further one.
    pub login_backoff: Duration,
    /// Suffix of the `x-client` header value. Not read from the environment.
    pub client_suffix: String,
}

impl Config {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            api_delay: Duration::from_secs(DEFAULT_API_DELAY_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_max_attempts: DEFAULT_LOGIN_ATTEMPTS,
            login_backoff: Duration::from_millis(DEFAULT_LOGIN_BACKOFF_MS),
            client_suffix: CLIENT_SUFFIX.to_string(),
        }
    }

    /// Load from the process environment, falling back to `./.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_file(Path::new(".env"))
    }

    /// Load from the process environment, falling back to the `KEY=value`
    /// pairs in `path`. A missing file is not an error.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_lookup_with_file(|key| std::env::var(key).ok(), path)
    }

    fn from_lookup_with_file<F>(lookup: F, path: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = read_env_file(path)?;
        Self::from_lookup(|key| lookup(key).or_else(|| file.get(key).cloned()))
    }

    /// Build a config from an arbitrary key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_url = get("HABITICA_BASE_URL");
        let username = get("HABITICA_USER");
        // Passwords may legitimately carry surrounding whitespace.
        let password = lookup("HABITICA_PW").filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = [
            ("HABITICA_BASE_URL", base_url.is_none()),
            ("HABITICA_USER", username.is_none()),
            ("HABITICA_PW", password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(base_url), Some(username), Some(password)) = (base_url, username, password) else {
            return Err(ConfigError::Missing(missing));
        };

        let mut config = Self::new(base_url, username, password);
        if let Some(secs) = parse_number::<u64>("HABITICA_API_DELAY", get("HABITICA_API_DELAY"))? {
            config.api_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number::<u64>("HABITICA_TIMEOUT_SECS", get("HABITICA_TIMEOUT_SECS"))? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_number::<u32>("HABITICA_LOGIN_ATTEMPTS", get("HABITICA_LOGIN_ATTEMPTS"))? {
            config.login_max_attempts = attempts.max(1);
        }
        if let Some(ms) = parse_number::<u64>("HABITICA_LOGIN_BACKOFF_MS", get("HABITICA_LOGIN_BACKOFF_MS"))? {
            config.login_backoff = Duration::from_millis(ms);
        }
        Ok(config)
    }

    pub fn with_api_delay(mut self, delay: Duration) -> Self {
        self.api_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_client_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.client_suffix = suffix.into();
        self
    }

    pub fn with_login_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.login_max_attempts = max_attempts.max(1);
        self.login_backoff = backoff;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_delay", &self.api_delay)
            .field("request_timeout", &self.request_timeout)
            .field("login_max_attempts", &self.login_max_attempts)
            .field("login_backoff", &self.login_backoff)
            .field("client_suffix", &self.client_suffix)
            .finish()
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |err: dotenvy::Error| ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    };
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => return Ok(HashMap::new()),
        Err(err) => return Err(env_file_error(err)),
    };
    iter.map(|item| item.map_err(env_file_error)).collect()
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    raw.map(|value| value.parse::<T>().map_err(|_| ConfigError::Invalid { name, value }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("HABITICA_BASE_URL", "https://habitica.com/api/v3/"),
        ("HABITICA_USER", "papa"),
        ("HABITICA_PW", "secret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.base_url, "https://habitica.com/api/v3");
        assert_eq!(config.username, "papa");
        assert_eq!(config.password, "secret");
        assert_eq!(config.api_delay, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.login_max_attempts, 3);
        assert_eq!(config.login_backoff, Duration::from_secs(1));
        assert_eq!(config.client_suffix, "PAPA");
    }

    #[test]
    fn missing_values_are_all_reported() {
        let err = Config::from_lookup(lookup(&[("HABITICA_USER", "papa"), ("HABITICA_PW", "")])).unwrap_err();
        match &err {
            ConfigError::Missing(names) => assert_eq!(names, &vec!["HABITICA_BASE_URL", "HABITICA_PW"]),
            other => panic!("expected Missing, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: HABITICA_BASE_URL, HABITICA_PW"
        );
    }

    #[test]
    fn optional_values_override_defaults() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("HABITICA_API_DELAY", "5"),
            ("HABITICA_TIMEOUT_SECS", "12"),
            ("HABITICA_LOGIN_ATTEMPTS", "0"),
            ("HABITICA_LOGIN_BACKOFF_MS", "250"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.api_delay, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.login_max_attempts, 1);
        assert_eq!(config.login_backoff, Duration::from_millis(250));
    }

    #[test]
    fn application_name_does_not_change_client_suffix() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("APPLICATION_NAME", "PA-Square"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.client_suffix, "PAPA");
        assert_eq!(config.with_client_suffix("BOT").client_suffix, "BOT");
    }

    #[test]
    fn env_file_supplies_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# local deployment\nHABITICA_BASE_URL=http://habitica.local/api/v3\nHABITICA_USER=from-file-user\nHABITICA_PW=\"from file\"\nHABITICA_API_DELAY=7\n",
        )
        .unwrap();

        let config = Config::from_lookup_with_file(lookup(&[("HABITICA_USER", "from-env-user")]), &path).unwrap();
        assert_eq!(config.base_url, "http://habitica.local/api/v3");
        assert_eq!(config.username, "from-env-user");
        assert_eq!(config.password, "from file");
        assert_eq!(config.api_delay, Duration::from_secs(7));
    }

    #[test]
    fn missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = read_env_file(&dir.path().join(".env")).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn malformed_env_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "HABITICA_USER='unterminated\n").unwrap();
        let err = read_env_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }), "{err:?}");
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("HABITICA_API_DELAY", "soon"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HABITICA_API_DELAY", .. }));
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::new("http://localhost", "papa", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
