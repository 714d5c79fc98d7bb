//! The transport contract the CLI core expects from the tracker.
//!
//! Everything the tracker can do for us is behind [`TrackerApi`] so the
//! connection manager, the one-shot executors, and the shoutbox poller can
//! be driven by a scripted transport in tests. The one production
//! implementation is [`crate::tracker::HttpTracker`].

use async_trait::async_trait;

use crate::Result;
use crate::tracker::models::{
    Credentials, DetailSections, Session, ShoutMessage, Shoutbox, TorrentDetails, TorrentSummary,
    UploadPayload,
};

/// Remote tracker operations.
///
/// All calls may fail with a transport-level error, surfaced verbatim by the
/// one-shot executors. The boolean results (`thank`, `comment`,
/// `shoutbox_write`) report the server's own accept/decline verdict; the
/// executor layer normalizes a bare `false` into [`crate::CoreError::Rejected`].
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Authenticate with the tracker and return the fresh session.
    async fn login(&self, credentials: &Credentials) -> Result<Session>;

    /// Install a previously persisted session into the transport.
    fn adopt(&self, session: &Session);

    /// Current session state as seen by the transport, including any cookie
    /// rotation the server performed during this run. `None` before login.
    fn session_state(&self) -> Option<Session>;

    /// Search torrents. `include_dead` also returns torrents without seeders.
    async fn search(
        &self,
        query: &str,
        categories: &[i64],
        include_dead: bool,
    ) -> Result<Vec<TorrentSummary>>;

    /// Fetch a single torrent record with the requested detail sections.
    async fn details(&self, id: i64, sections: DetailSections) -> Result<TorrentDetails>;

    /// Download the torrent metadata file. Returns the raw bytes and the
    /// server-suggested file name.
    async fn download(&self, id: i64) -> Result<(Vec<u8>, String)>;

    /// Create a new upload. Returns the id of the created torrent.
    async fn upload(&self, payload: UploadPayload) -> Result<i64>;

    /// Thank the uploader of a torrent.
    async fn thank(&self, id: i64) -> Result<bool>;

    /// Post a comment on a torrent.
    async fn comment(&self, id: i64, text: &str) -> Result<bool>;

    /// Read shoutbox messages with an id strictly greater than `since`.
    /// `since` = 0 returns the whole available backlog.
    async fn shoutbox_read(&self, shoutbox: Shoutbox, since: i64) -> Result<Vec<ShoutMessage>>;

    /// Post a message to a shoutbox.
    async fn shoutbox_write(&self, shoutbox: Shoutbox, text: &str) -> Result<bool>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted transport for exercising the core against canned data.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::CoreError;
    use crate::tracker::models::ShoutEvent;

    /// Scripted [`TrackerApi`] implementation.
    pub(crate) struct MockTracker {
        pub login_calls: AtomicUsize,
        pub login_uid: i64,
        pub adopted: Mutex<Option<Session>>,
        pub accept_writes: bool,
        pub search_results: Mutex<Vec<TorrentSummary>>,
        pub download_file: (Vec<u8>, String),
        /// Scripted responses for successive `shoutbox_read` calls.
        pub batches: Mutex<VecDeque<Result<Vec<ShoutMessage>>>>,
        /// The `since` argument of every `shoutbox_read` call, in order.
        pub reads: Mutex<Vec<i64>>,
    }

    impl Default for MockTracker {
        fn default() -> Self {
            Self {
                login_calls: AtomicUsize::new(0),
                login_uid: 42,
                adopted: Mutex::new(None),
                accept_writes: true,
                search_results: Mutex::new(Vec::new()),
                download_file: (b"d8:announce0:e".to_vec(), "server.torrent".to_string()),
                batches: Mutex::new(VecDeque::new()),
                reads: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockTracker {
        pub(crate) fn with_batches(
            batches: impl IntoIterator<Item = Result<Vec<ShoutMessage>>>,
        ) -> Self {
            Self {
                batches: Mutex::new(batches.into_iter().collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TrackerApi for MockTracker {
        async fn login(&self, _credentials: &Credentials) -> Result<Session> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            let session = Session {
                uid: self.login_uid,
                cookies: format!("uid={}; pass=fresh", self.login_uid),
            };
            *self.adopted.lock().expect("lock") = Some(session.clone());
            Ok(session)
        }

        fn adopt(&self, session: &Session) {
            *self.adopted.lock().expect("lock") = Some(session.clone());
        }

        fn session_state(&self) -> Option<Session> {
            self.adopted.lock().expect("lock").clone()
        }

        async fn search(
            &self,
            _query: &str,
            _categories: &[i64],
            _include_dead: bool,
        ) -> Result<Vec<TorrentSummary>> {
            Ok(self.search_results.lock().expect("lock").clone())
        }

        async fn details(&self, id: i64, _sections: DetailSections) -> Result<TorrentDetails> {
            Ok(TorrentDetails {
                id,
                name: "sample".to_string(),
                info_hash: "00".repeat(20),
                category: 1,
                size: 1024,
                added: Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts"),
                file_count: 1,
                seeders: 1,
                leechers: 0,
                snatches: 0,
                description: String::new(),
                files: Vec::new(),
                peers: Vec::new(),
                snatch_list: Vec::new(),
            })
        }

        async fn download(&self, _id: i64) -> Result<(Vec<u8>, String)> {
            Ok(self.download_file.clone())
        }

        async fn upload(&self, _payload: UploadPayload) -> Result<i64> {
            Ok(9001)
        }

        async fn thank(&self, _id: i64) -> Result<bool> {
            Ok(self.accept_writes)
        }

        async fn comment(&self, _id: i64, _text: &str) -> Result<bool> {
            Ok(self.accept_writes)
        }

        async fn shoutbox_read(
            &self,
            _shoutbox: Shoutbox,
            since: i64,
        ) -> Result<Vec<ShoutMessage>> {
            self.reads.lock().expect("lock").push(since);
            self.batches
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn shoutbox_write(&self, _shoutbox: Shoutbox, _text: &str) -> Result<bool> {
            Ok(self.accept_writes)
        }
    }

    /// A chat message with the given id.
    pub(crate) fn chat(id: i64, body: &str) -> ShoutMessage {
        ShoutMessage {
            id,
            user: "poster".to_string(),
            posted_at: Utc.timestamp_opt(1_700_000_000 + id, 0).single().expect("ts"),
            body: body.to_string(),
            event: None,
        }
    }

    /// A control message announcing unread private messages.
    pub(crate) fn unread_notice(id: i64, count: u32) -> ShoutMessage {
        ShoutMessage {
            event: Some(ShoutEvent::UnreadMessages { count }),
            ..chat(id, "")
        }
    }

    /// An API error for scripting transient fetch failures.
    pub(crate) fn fetch_error() -> CoreError {
        CoreError::Api("connection reset by peer".to_string())
    }
}
