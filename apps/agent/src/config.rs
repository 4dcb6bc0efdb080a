//! Agent configuration management.
//!
//! Configuration is stored as TOML next to the session file:
//! - Linux: `$XDG_CONFIG_HOME/callrelay/agent.toml` (or `~/.config/...`)
//! - Windows: `%APPDATA%/callrelay/agent.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use callrelay_uploader::{Backoff, RetryPolicy, app_config_dir, default_session_path};
use callrelay_watcher::WatchBackend;
use serde::{Deserialize, Serialize};

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the call records server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Folder the call recorder writes into.
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Upload attempts per recording.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upload recordings already present when the agent starts.
    #[serde(default)]
    pub scan_existing_on_start: bool,

    /// Folder watch backend: `native` or `poll`.
    #[serde(default)]
    pub watcher: WatchBackend,

    /// Scan interval for the `poll` backend, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Initial delay of exponential backoff between attempts, in
    /// milliseconds. Unset means attempts run back-to-back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,

    /// Session token file. Defaults to `~/.config/callrelay/session.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_watch_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/sdcard".into());
    PathBuf::from(home).join("Recordings").join("Call")
}

fn default_max_attempts() -> u32 {
    callrelay_uploader::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            watch_dir: default_watch_dir(),
            max_attempts: default_max_attempts(),
            scan_existing_on_start: false,
            watcher: WatchBackend::default(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: None,
            retry_backoff_ms: None,
            session_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or creates a default there if not found.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the current configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self
                .retry_backoff_ms
                .map(|ms| Backoff::exponential(Duration::from_millis(ms))),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Session file in use: the configured one, or the platform default.
    pub fn session_path(&self) -> anyhow::Result<PathBuf> {
        self.session_file
            .clone()
            .or_else(default_session_path)
            .ok_or_else(|| anyhow::anyhow!("cannot determine a location for the session file"))
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    app_config_dir()
        .map(|d| d.join("agent.toml"))
        .ok_or_else(|| anyhow::anyhow!("cannot determine a location for the configuration file"))
}
