//! Data models for the tracker.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Account credentials plus the tracker base URL.
///
/// Created once by `trk init` and never mutated afterwards; every later run
/// reads them back from the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Account pin, required by the login form.
    pub pin: String,
    /// Base URL of the tracker, e.g. `https://irrenhaus.dyndns.dk`.
    pub base_url: String,
}

/// An authenticated tracker session.
///
/// `cookies` is the opaque cookie set in `Cookie` header form
/// (`name=value; name2=value2`); the server decides when it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Numeric user id reported by the tracker. Zero means "not logged in".
    pub uid: i64,
    /// Opaque cookie set for authenticated requests.
    pub cookies: String,
}

impl Session {
    /// Whether this session belongs to a logged-in user.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.uid > 0
    }
}

/// The closed set of shoutboxes the tracker exposes.
///
/// Each box maps to a small positive channel id on the wire. Anything other
/// than the named boxes is a configuration error, caught before any network
/// call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shoutbox {
    /// The general user shoutbox.
    User,
    /// The team shoutbox.
    Team,
}

impl Shoutbox {
    /// Wire channel id of this box.
    #[must_use]
    pub const fn channel_id(self) -> u8 {
        match self {
            Self::User => 1,
            Self::Team => 2,
        }
    }
}

impl FromStr for Shoutbox {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "team" => Ok(Self::Team),
            other => Err(CoreError::Config(format!(
                "invalid shoutbox name '{other}' (expected 'user' or 'team')"
            ))),
        }
    }
}

impl std::fmt::Display for Shoutbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Team => write!(f, "team"),
        }
    }
}

/// A shoutbox entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoutMessage {
    /// Message id, strictly increasing per box.
    pub id: i64,
    /// Author name. Empty for server-generated entries.
    pub user: String,
    /// Time the message was posted.
    pub posted_at: DateTime<Utc>,
    /// Message text.
    pub body: String,
    /// Control-event payload; present means this is not user chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ShoutEvent>,
}

impl ShoutMessage {
    /// Whether this entry carries a server-side control event rather than chat.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        self.event.is_some()
    }
}

/// A server-side control event delivered in-stream with shoutbox chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShoutEvent {
    /// The account has unread private messages.
    UnreadMessages {
        /// Number of unread private messages.
        count: u32,
    },
}

/// One row of a search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentSummary {
    /// Torrent id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Time the torrent was added to the tracker.
    pub added: DateTime<Utc>,
    /// Current seeder count.
    pub seeders: u32,
    /// Current leecher count.
    pub leechers: u32,
}

/// Full torrent record with optional detail sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentDetails {
    /// Torrent id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Info hash, hex-encoded.
    pub info_hash: String,
    /// Numeric category id.
    pub category: i64,
    /// Payload size in bytes.
    pub size: u64,
    /// Time the torrent was added.
    pub added: DateTime<Utc>,
    /// Number of payload files.
    pub file_count: u32,
    /// Current seeder count.
    pub seeders: u32,
    /// Current leecher count.
    pub leechers: u32,
    /// Completed download count.
    pub snatches: u32,
    /// Uploader-provided description text.
    pub description: String,
    /// Payload file list, present when requested.
    #[serde(default)]
    pub files: Vec<TorrentFile>,
    /// Peer list, present when requested.
    #[serde(default)]
    pub peers: Vec<Peer>,
    /// Snatch list, present when requested.
    #[serde(default)]
    pub snatch_list: Vec<Snatch>,
}

/// A file inside a torrent payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFile {
    /// File name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
}

/// A peer currently on a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Peer's account name.
    pub name: String,
    /// Whether the peer seeds the torrent.
    pub seeder: bool,
    /// Whether the peer accepts incoming connections.
    pub connectable: bool,
    /// Bytes uploaded.
    pub uploaded: u64,
    /// Bytes downloaded.
    pub downloaded: u64,
    /// Current upload rate in bytes per second.
    pub ul_rate: u64,
    /// Current download rate in bytes per second.
    pub dl_rate: u64,
    /// Share ratio. Zero stands for infinite.
    pub ratio: f64,
    /// Completion percentage for leechers.
    pub completed: f64,
    /// Client identification string.
    pub client: String,
}

/// A completed (snatched) download of a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snatch {
    /// Account name.
    pub name: String,
    /// Bytes uploaded.
    pub uploaded: u64,
    /// Bytes downloaded.
    pub downloaded: u64,
    /// Share ratio.
    pub ratio: f64,
    /// Whether the account still seeds.
    pub seeding: bool,
    /// Time seeding stopped, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<DateTime<Utc>>,
}

/// Which detail sections the caller wants rendered.
///
/// A presentation toggle, not a protocol constraint: an unknown section name
/// selects nothing extra instead of failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetailSections {
    /// Basic info block (hash, category, size, counts, description).
    pub info: bool,
    /// Payload file list.
    pub files: bool,
    /// Peer list.
    pub peers: bool,
    /// Snatch list.
    pub snatches: bool,
}

impl DetailSections {
    /// Select sections by subcommand name: `info`, `files`, `peers`,
    /// `snatch`, or `all`. Unknown names select nothing.
    #[must_use]
    pub fn select(name: &str) -> Self {
        match name {
            "info" => Self {
                info: true,
                ..Self::default()
            },
            "files" => Self {
                files: true,
                ..Self::default()
            },
            "peers" => Self {
                peers: true,
                ..Self::default()
            },
            "snatch" => Self {
                snatches: true,
                ..Self::default()
            },
            "all" => Self {
                info: true,
                files: true,
                peers: true,
                snatches: true,
            },
            _ => Self::default(),
        }
    }
}

/// A new upload, described by local file paths.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Path to the torrent metadata file.
    pub torrent: PathBuf,
    /// Path to the nfo file.
    pub nfo: PathBuf,
    /// Path to the first image.
    pub image1: PathBuf,
    /// Path to the optional second image.
    pub image2: Option<PathBuf>,
    /// Path to the description text file.
    pub description: PathBuf,
    /// Display name for the new torrent.
    pub name: String,
    /// Numeric category id.
    pub category: i64,
}

/// A fully-read upload, ready to be sent to the tracker.
///
/// Built by the upload executor after all local files opened successfully,
/// so no network side effect happens on a half-readable upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    /// Torrent metadata file name and contents.
    pub torrent: (String, Vec<u8>),
    /// Nfo file name and contents.
    pub nfo: (String, Vec<u8>),
    /// First image file name and contents.
    pub image1: (String, Vec<u8>),
    /// Optional second image file name and contents.
    pub image2: Option<(String, Vec<u8>)>,
    /// Description text.
    pub description: String,
    /// Display name for the new torrent.
    pub name: String,
    /// Numeric category id.
    pub category: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shoutbox_names_map_to_channel_ids() {
        let user = "user".parse::<Shoutbox>().expect("user box parses");
        let team = "team".parse::<Shoutbox>().expect("team box parses");
        assert_eq!(user.channel_id(), 1);
        assert_eq!(team.channel_id(), 2);
    }

    #[test]
    fn unknown_shoutbox_name_is_a_config_error() {
        let err = "mods".parse::<Shoutbox>().unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn detail_sections_select_known_names() {
        assert!(DetailSections::select("info").info);
        assert!(DetailSections::select("files").files);
        assert!(DetailSections::select("peers").peers);
        assert!(DetailSections::select("snatch").snatches);

        let all = DetailSections::select("all");
        assert!(all.info && all.files && all.peers && all.snatches);
    }

    #[test]
    fn unknown_detail_section_selects_nothing() {
        assert_eq!(DetailSections::select("bogus"), DetailSections::default());
    }

    #[test]
    fn session_liveness_tracks_uid() {
        let dead = Session {
            uid: 0,
            cookies: String::new(),
        };
        let live = Session {
            uid: 42,
            cookies: "uid=42; pass=x".to_string(),
        };
        assert!(!dead.is_live());
        assert!(live.is_live());
    }
}
