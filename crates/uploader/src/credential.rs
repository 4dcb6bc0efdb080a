//! Bearer token storage.
//!
//! The session file holds the token issued by `POST /login`. It is written by
//! `login`, removed by `logout`, and read on every upload attempt so that a
//! running agent picks up a new login without a restart.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Read-only access to the current bearer token.
pub trait CredentialSource: Send + Sync {
    /// Returns the current token, if any. May return an empty string.
    fn token(&self) -> Option<String>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

/// File-backed token store.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store backed by `path`. The file need not exist yet.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the token issued at login, replacing any previous one.
    ///
    /// Written to a private temp file next to the session file and renamed
    /// over it, so concurrent readers see either the old or the new token.
    pub fn save_token(&self, token: &str) -> Result<(), StoreError> {
        let session = Session {
            auth_token: Some(token.to_string()),
        };
        let json = serde_json::to_string_pretty(&session)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        if let Err(e) = write_private(&tmp, json.as_bytes()) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "saved session token");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session.json".into());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }

    /// Removes the stored token (logout). Missing file is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed session token");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether a token is stored.
    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&data)?;
        Ok(session.auth_token)
    }
}

impl CredentialSource for TokenStore {
    fn token(&self) -> Option<String> {
        match self.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable session file");
                None
            }
        }
    }
}

/// Creates `path` with owner-only permissions on Unix and writes `data`.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    // A leftover from an interrupted save would keep its old mode.
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Returns the default session file path.
pub fn default_session_path() -> Option<PathBuf> {
    app_config_dir().map(|d| d.join("session.json"))
}

/// Returns the directory holding the agent's configuration and session files.
pub fn app_config_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("callrelay"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, TokenStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("callrelay").join("session.json"));
        (tmp, store)
    }

    #[test]
    fn new_store_has_no_token() {
        let (_tmp, store) = test_store();
        assert!(store.token().is_none());
        assert!(!store.is_logged_in());
    }

    #[test]
    fn save_and_read_token() {
        let (_tmp, store) = test_store();
        store.save_token("jwt-abc").unwrap();
        assert_eq!(store.token().as_deref(), Some("jwt-abc"));
        assert!(store.is_logged_in());
    }

    #[test]
    fn overwrite_token() {
        let (_tmp, store) = test_store();
        store.save_token("old").unwrap();
        store.save_token("new").unwrap();
        assert_eq!(store.token().as_deref(), Some("new"));
    }

    #[test]
    fn clear_removes_token() {
        let (_tmp, store) = test_store();
        store.save_token("jwt-abc").unwrap();
        store.clear().unwrap();
        assert!(store.token().is_none());
        // Second logout is a no-op.
        store.clear().unwrap();
    }

    #[test]
    fn second_handle_sees_login() {
        let (_tmp, store) = test_store();
        let reader = TokenStore::new(store.path().to_path_buf());
        assert!(reader.token().is_none());

        store.save_token("fresh").unwrap();
        assert_eq!(reader.token().as_deref(), Some("fresh"));
    }

    #[test]
    fn corrupt_file_reads_as_absent() {
        let (_tmp, store) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.token().is_none());
    }

    #[test]
    fn empty_token_is_returned_as_is() {
        let (_tmp, store) = test_store();
        store.save_token("").unwrap();
        assert_eq!(store.token().as_deref(), Some(""));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, store) = test_store();
        store.save_token("jwt").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let (_tmp, store) = test_store();
        store.save_token("a").unwrap();
        store.save_token("b").unwrap();

        let dir = store.path().parent().unwrap();
        let names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["session.json"]);
    }

    #[test]
    fn concurrent_reader_never_sees_partial_session() {
        let (_tmp, store) = test_store();
        store.save_token("initial").unwrap();

        let reader = TokenStore::new(store.path().to_path_buf());
        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let done2 = std::sync::Arc::clone(&done);
        let reads = std::thread::spawn(move || {
            let mut misses = 0;
            while !done2.load(std::sync::atomic::Ordering::Relaxed) {
                if reader.token().is_none() {
                    misses += 1;
                }
            }
            misses
        });

        for i in 0..300 {
            store.save_token(&format!("token-{i}-{}", "x".repeat(512))).unwrap();
        }
        done.store(true, std::sync::atomic::Ordering::Relaxed);

        assert_eq!(reads.join().unwrap(), 0);
        assert!(store.token().unwrap().starts_with("token-299-"));
    }

    #[cfg(unix)]
    #[test]
    fn stale_temp_file_does_not_leak_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, store) = test_store();
        let tmp = store.temp_path();
        std::fs::create_dir_all(tmp.parent().unwrap()).unwrap();
        std::fs::write(&tmp, "{}").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.save_token("jwt").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
    }

    #[test]
    fn default_path_names_the_app() {
        if let Some(path) = default_session_path() {
            assert!(path.ends_with("callrelay/session.json"));
        }
    }
}
