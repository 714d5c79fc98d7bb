//! Lazy, once-per-process tracker authentication.
//!
//! A [`Connection`] wraps a transport and the on-disk session store. The
//! first operation that needs an authenticated transport triggers session
//! restore (or a fresh login); every later caller in the same process gets
//! the already-established session. On clean exit the CLI calls
//! [`Connection::persist`] so cookie rotation survives into the next run.

use tokio::sync::OnceCell;

use crate::tracker::models::Session;
use crate::tracker::store::SessionStore;
use crate::tracker::transport::TrackerApi;
use crate::{CoreError, Result};

/// A transport paired with persistent session state.
#[derive(Debug)]
pub struct Connection<T: TrackerApi> {
    api: T,
    store: SessionStore,
    session: OnceCell<Session>,
}

impl<T: TrackerApi> Connection<T> {
    /// Pair a transport with a session store. No I/O happens until the
    /// first call to [`Self::session`].
    pub const fn new(api: T, store: SessionStore) -> Self {
        Self {
            api,
            store,
            session: OnceCell::const_new(),
        }
    }

    /// The underlying transport.
    pub const fn api(&self) -> &T {
        &self.api
    }

    /// The live session, establishing it on first use.
    ///
    /// A stored session is adopted as-is; a missing or unreadable one falls
    /// back to a fresh login with the stored credentials. Login happens at
    /// most once per process regardless of how many operations run.
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials are stored, login is declined, or
    /// the session store fails for a reason other than a missing or
    /// malformed session record.
    pub async fn session(&self) -> Result<&Session> {
        self.session
            .get_or_try_init(|| self.establish())
            .await
    }

    async fn establish(&self) -> Result<Session> {
        match self.store.load_session() {
            Ok(session) if session.is_live() => {
                log::debug!("restored session for uid {}", session.uid);
                self.api.adopt(&session);
                Ok(session)
            }
            // A dead record or a missing/garbled file both mean "log in again".
            Ok(_) | Err(CoreError::NotFound(_) | CoreError::Serialization(_)) => {
                let credentials = self.store.load_credentials()?;
                let session = self.api.login(&credentials).await?;
                log::info!("logged in as uid {}", session.uid);
                Ok(session)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the current session state back to disk.
    ///
    /// Prefers the transport's own view so rotated cookies are captured;
    /// a session that never became live is not persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the session record fails.
    pub fn persist(&self) -> Result<()> {
        let current = self
            .api
            .session_state()
            .filter(Session::is_live)
            .or_else(|| self.session.get().cloned());
        match current {
            Some(session) if session.is_live() => self.store.save_session(&session),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::models::Credentials;
    use crate::tracker::transport::testing::MockTracker;

    fn store_with_credentials(dir: &std::path::Path) -> SessionStore {
        let store = SessionStore::new(dir.to_path_buf());
        store
            .save_credentials(&Credentials {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
                pin: "0000".to_string(),
                base_url: "https://tracker.example".to_string(),
            })
            .expect("save credentials");
        store
    }

    #[tokio::test]
    async fn login_happens_at_most_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = Connection::new(MockTracker::default(), store_with_credentials(dir.path()));

        let first = conn.session().await.expect("first session");
        let second = conn.session().await.expect("second session");

        assert!(std::ptr::eq(first, second));
        assert_eq!(
            conn.api().login_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn stored_session_is_adopted_without_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_with_credentials(dir.path());
        store
            .save_session(&Session {
                uid: 7,
                cookies: "uid=7; pass=stored".to_string(),
            })
            .expect("save session");

        let conn = Connection::new(MockTracker::default(), store);
        let session = conn.session().await.expect("session");

        assert_eq!(session.uid, 7);
        assert_eq!(
            conn.api().login_calls.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
        let adopted = conn.api().adopted.lock().expect("lock").clone();
        assert_eq!(adopted.map(|s| s.cookies), Some("uid=7; pass=stored".to_string()));
    }

    #[tokio::test]
    async fn corrupt_session_record_falls_back_to_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_with_credentials(dir.path());
        std::fs::write(dir.path().join("session.json"), b"not json").expect("write");

        let conn = Connection::new(MockTracker::default(), store);
        let session = conn.session().await.expect("session");

        assert_eq!(session.uid, 42);
        assert_eq!(
            conn.api().login_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn missing_credentials_surface_as_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = Connection::new(
            MockTracker::default(),
            SessionStore::new(dir.path().to_path_buf()),
        );

        let err = conn.session().await.expect_err("no credentials");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn persist_writes_only_live_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_with_credentials(dir.path());
        let conn = Connection::new(MockTracker::default(), store);

        // Nothing established yet, nothing written.
        conn.persist().expect("persist no-op");
        assert!(!dir.path().join("session.json").exists());

        conn.session().await.expect("session");
        conn.persist().expect("persist");

        let reloaded = SessionStore::new(dir.path().to_path_buf())
            .load_session()
            .expect("reload");
        assert_eq!(reloaded.uid, 42);
    }
}
