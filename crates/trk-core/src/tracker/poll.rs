//! Incremental shoutbox polling.
//!
//! [`PollState`] is the pure incremental-fetch state machine: it tracks the
//! high-water message id and decides which messages of a batch are fresh.
//! [`Poller`] drives it against a live transport with a countdown between
//! fetches and cooperative shutdown via a watch channel.

use std::io::Write as _;
use std::time::Duration;

use tokio::sync::watch;

use crate::Result;
use crate::tracker::connect::Connection;
use crate::tracker::models::{ShoutEvent, ShoutMessage, Shoutbox};
use crate::tracker::transport::TrackerApi;

/// Incremental-fetch state for one shoutbox.
#[derive(Debug, Default)]
pub struct PollState {
    watermark: i64,
    unread: Option<u32>,
    last_error: Option<String>,
}

impl PollState {
    /// Fresh state. The first fetch asks for the whole backlog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            watermark: 0,
            unread: None,
            last_error: None,
        }
    }

    /// Highest message id seen so far; the `since` for the next fetch.
    #[must_use]
    pub const fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Fold a fetched batch into the state and return the messages that
    /// should be rendered.
    ///
    /// Messages at or below the watermark at batch start are duplicates from
    /// an overlapping window and are dropped. Control messages advance the
    /// watermark and update the status but are never rendered. Batches may
    /// arrive in any id order.
    pub fn absorb(&mut self, batch: Vec<ShoutMessage>) -> Vec<ShoutMessage> {
        let floor = self.watermark;
        let mut fresh = Vec::new();
        for message in batch {
            if message.id > self.watermark {
                self.watermark = message.id;
            }
            if message.id <= floor {
                continue;
            }
            match message.event {
                Some(ShoutEvent::UnreadMessages { count }) => self.unread = Some(count),
                None => fresh.push(message),
            }
        }
        self.last_error = None;
        fresh
    }

    /// Remember a failed fetch. Shown in the status line until the next
    /// successful fetch.
    pub fn note_error(&mut self, error: &crate::CoreError) {
        self.last_error = Some(error.to_string());
    }

    /// Extra text for the countdown line: unread-message notice and the
    /// last transient error, if any.
    #[must_use]
    pub fn status_suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(count) = self.unread {
            let plural = if count == 1 { "" } else { "s" };
            suffix.push_str(&format!(", {count} unread PM{plural}"));
        }
        if let Some(error) = &self.last_error {
            suffix.push_str(&format!(" - last error: {error}"));
        }
        suffix
    }
}

/// One shoutbox message in terminal form.
#[must_use]
pub fn render_message(message: &ShoutMessage) -> String {
    format!(
        "[{}] <{}> {}",
        message.posted_at.format("%m.%d %H:%M"),
        message.user,
        message.body
    )
}

/// Repeatedly fetches a shoutbox and prints fresh messages.
#[derive(Debug)]
pub struct Poller<'a, T: TrackerApi> {
    conn: &'a Connection<T>,
    shoutbox: Shoutbox,
    refresh: Duration,
}

impl<T: TrackerApi> Clone for Poller<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: TrackerApi> Copy for Poller<'_, T> {}

impl<'a, T: TrackerApi> Poller<'a, T> {
    /// Build a poller for one shoutbox with the given refresh interval.
    pub const fn new(conn: &'a Connection<T>, shoutbox: Shoutbox, refresh: Duration) -> Self {
        Self {
            conn,
            shoutbox,
            refresh,
        }
    }

    /// Poll until the shutdown channel flips to `true`.
    ///
    /// Transient fetch errors are logged and shown in the status line; the
    /// loop keeps going with the watermark unchanged. Shutdown is honored
    /// between fetches, never mid-request.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial authentication fails.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.conn.session().await?;
        let mut state = PollState::new();
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self
                .conn
                .api()
                .shoutbox_read(self.shoutbox, state.watermark())
                .await
            {
                Ok(batch) => {
                    let fresh = state.absorb(batch);
                    if !fresh.is_empty() {
                        clear_line();
                        for message in &fresh {
                            println!("{}", render_message(message));
                        }
                    }
                }
                Err(e) => {
                    log::warn!("shoutbox fetch failed: {e}");
                    state.note_error(&e);
                }
            }
            if self.countdown(&mut shutdown, &state).await {
                break;
            }
        }
        Ok(())
    }

    /// Per-second countdown between fetches. Returns `true` on shutdown.
    async fn countdown(&self, shutdown: &mut watch::Receiver<bool>, state: &PollState) -> bool {
        let secs = self.refresh.as_secs().max(1);
        for remaining in (1..=secs).rev() {
            clear_line();
            print!("[refresh in {remaining}s{}]", state.status_suffix());
            flush_stdout();
            tokio::select! {
                _ = shutdown.changed() => {
                    println!();
                    return true;
                }
                () = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
        clear_line();
        print!("[refreshing]");
        flush_stdout();
        false
    }
}

fn clear_line() {
    print!("\r\x1b[2K");
}

fn flush_stdout() {
    if let Err(e) = std::io::stdout().flush() {
        log::debug!("flushing stdout: {e}");
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;
    use crate::CoreError;
    use crate::tracker::models::Credentials;
    use crate::tracker::store::SessionStore;
    use crate::tracker::transport::testing::{MockTracker, chat, fetch_error, unread_notice};

    fn connection(dir: &std::path::Path, api: MockTracker) -> Connection<MockTracker> {
        let store = SessionStore::new(dir.to_path_buf());
        store
            .save_credentials(&Credentials {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
                pin: "0000".to_string(),
                base_url: "https://tracker.example".to_string(),
            })
            .expect("save credentials");
        Connection::new(api, store)
    }

    #[test]
    fn backlog_in_any_order_renders_all_and_sets_watermark_to_max() {
        let mut state = PollState::new();
        let fresh = state.absorb(vec![chat(5, "e"), chat(3, "c"), chat(8, "h"), chat(1, "a")]);

        assert_eq!(fresh.len(), 4);
        assert_eq!(state.watermark(), 8);
    }

    #[test]
    fn overlapping_windows_do_not_render_twice() {
        let mut state = PollState::new();
        state.absorb(vec![chat(5, "e"), chat(8, "h")]);
        let fresh = state.absorb(vec![chat(8, "h"), chat(9, "i")]);

        let ids: Vec<i64> = fresh.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![9]);
        assert_eq!(state.watermark(), 9);
    }

    #[test]
    fn control_messages_advance_watermark_without_rendering() {
        let mut state = PollState::new();
        let fresh = state.absorb(vec![chat(4, "d"), unread_notice(6, 3)]);

        let ids: Vec<i64> = fresh.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![4]);
        assert_eq!(state.watermark(), 6);
        assert!(state.status_suffix().contains("3 unread PMs"));
    }

    #[test]
    fn fetch_errors_show_up_until_the_next_good_batch() {
        let mut state = PollState::new();
        state.absorb(vec![chat(2, "b")]);
        state.note_error(&fetch_error());

        assert!(state.status_suffix().contains("last error"));
        assert_eq!(state.watermark(), 2);

        state.absorb(vec![chat(3, "c")]);
        assert!(!state.status_suffix().contains("last error"));
    }

    #[test]
    fn message_rendering_format() {
        let rendered = render_message(&chat(1, "hello there"));
        assert!(rendered.starts_with('['));
        assert!(rendered.contains("<poster> hello there"));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_advances_past_transient_errors_and_stops_on_shutdown() {
        let api = MockTracker::with_batches([
            Ok(vec![chat(1, "a")]),
            Err(fetch_error()),
            Ok(vec![chat(2, "b")]),
        ]);
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = connection(dir.path(), api);
        let (tx, rx) = watch::channel(false);
        let poller = Poller::new(&conn, Shoutbox::User, Duration::from_secs(1));

        let control = async {
            loop {
                if conn.api().reads.lock().expect("lock").len() >= 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(true).expect("send shutdown");
        };

        let (run_result, ()) = tokio::join!(poller.run(rx), control);
        run_result.expect("poller exits cleanly");

        // First fetch asks for the backlog, later ones resume at the
        // watermark; the failed fetch does not move it.
        let reads = conn.api().reads.lock().expect("lock").clone();
        assert_eq!(reads, vec![0, 1, 1]);
    }

    #[tokio::test]
    async fn poller_exits_without_fetching_when_already_shut_down() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = connection(dir.path(), MockTracker::default());
        let (tx, rx) = watch::channel(true);
        drop(tx);

        Poller::new(&conn, Shoutbox::User, Duration::from_secs(1))
            .run(rx)
            .await
            .expect("clean exit");
        assert!(conn.api().reads.lock().expect("lock").is_empty());
    }

    #[test]
    fn rejected_error_reads_as_unknown() {
        assert_eq!(CoreError::Rejected.to_string(), "unknown error");
    }
}
