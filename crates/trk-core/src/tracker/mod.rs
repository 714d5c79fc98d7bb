//! Tracker access: transport, session lifecycle, operations, and polling.
//!
//! The module splits along the seams a CLI run crosses: [`transport`]
//! defines what the remote tracker can do, [`client`] implements it over
//! HTTP, [`store`] and [`connect`] handle credentials and the lazy session,
//! [`ops`] are the one-shot commands, and [`poll`] is the live shoutbox
//! loop.

pub mod client;
pub mod connect;
pub mod models;
pub mod ops;
pub mod poll;
pub mod store;
pub mod transport;

pub use client::HttpTracker;
pub use connect::Connection;
pub use models::{
    Credentials, DetailSections, Peer, Session, ShoutEvent, ShoutMessage, Shoutbox, Snatch,
    TorrentDetails, TorrentFile, TorrentSummary, UploadPayload, UploadRequest,
};
pub use poll::{PollState, Poller, render_message};
pub use store::SessionStore;
pub use transport::TrackerApi;
