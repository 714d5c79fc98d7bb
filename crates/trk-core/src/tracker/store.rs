//! Persisted credentials and session records.
//!
//! Two separate JSON files live in the state directory so a lost session
//! never takes the credentials with it:
//!
//! - `credentials.json` - username, password, pin, base URL
//! - `session.json` - user id and cookie set from the last login
//!
//! The store reports every failure faithfully; deciding that a missing
//! session means "log in fresh" is the connection manager's call.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CoreError;
use crate::tracker::models::{Credentials, Session};

/// File-backed store for the credentials and session records.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Credentials record file name.
    pub const CREDENTIALS_FILE: &str = "credentials.json";
    /// Session record file name.
    pub const SESSION_FILE: &str = "session.json";

    /// Create a store rooted at the given state directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the persisted credentials.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist, `Serialization` if it is
    /// malformed, `Io` on read failure.
    pub fn load_credentials(&self) -> Result<Credentials, CoreError> {
        self.read_record(Self::CREDENTIALS_FILE)
    }

    /// Write the credentials record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save_credentials(&self, credentials: &Credentials) -> Result<(), CoreError> {
        self.write_record(Self::CREDENTIALS_FILE, credentials)
    }

    /// Load the persisted session.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist, `Serialization` if it is
    /// malformed, `Io` on read failure.
    pub fn load_session(&self) -> Result<Session, CoreError> {
        self.read_record(Self::SESSION_FILE)
    }

    /// Write the session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save_session(&self, session: &Session) -> Result<(), CoreError> {
        self.write_record(Self::SESSION_FILE, session)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_record<T: DeserializeOwned>(&self, name: &str) -> Result<T, CoreError> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(CoreError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(&path).map_err(CoreError::Io)?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::Serialization(format!("parsing {}: {e}", path.display()))
        })
    }

    // Overwrites atomically: write a sibling temp file, then rename over the
    // record so a crash mid-write never leaves a half-written file behind.
    fn write_record<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CoreError> {
        fs::create_dir_all(&self.dir).map_err(CoreError::Io)?;
        let path = self.record_path(name);
        let tmp = self.record_path(&format!(".{name}.tmp"));

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| CoreError::Serialization(format!("serializing {name}: {e}")))?;
        fs::write(&tmp, json).map_err(CoreError::Io)?;
        fs::rename(&tmp, &path).map_err(CoreError::Io)?;
        restrict_permissions(&path);
        Ok(())
    }
}

// These records carry the account password, keep them owner-only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credentials() -> Credentials {
        Credentials {
            username: "melvin".to_string(),
            password: "hunter2".to_string(),
            pin: "1234".to_string(),
            base_url: "https://tracker.test".to_string(),
        }
    }

    #[test]
    fn credentials_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());

        store
            .save_credentials(&sample_credentials())
            .expect("save credentials");
        let loaded = store.load_credentials().expect("load credentials");
        assert_eq!(loaded.username, "melvin");
        assert_eq!(loaded.base_url, "https://tracker.test");
    }

    #[test]
    fn session_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());

        let session = Session {
            uid: 7,
            cookies: "uid=7; pass=abc".to_string(),
        };
        store.save_session(&session).expect("save session");
        assert_eq!(store.load_session().expect("load session"), session);
    }

    #[test]
    fn missing_record_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());

        assert!(matches!(
            store.load_session(),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            store.load_credentials(),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_record_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        fs::create_dir_all(dir.path()).expect("mkdir");
        fs::write(dir.path().join(SessionStore::SESSION_FILE), "{ not json").expect("write");

        assert!(matches!(
            store.load_session(),
            Err(CoreError::Serialization(_))
        ));
    }
}
