//! One-shot tracker operations.
//!
//! Thin executors over an authenticated [`Connection`]: each ensures the
//! session exists, performs exactly one remote call, and shapes the result
//! for the CLI. Boolean verdict endpoints normalize a declined-without-reason
//! answer into [`CoreError::Rejected`] so callers always get a real error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::tracker::connect::Connection;
use crate::tracker::models::{
    DetailSections, ShoutMessage, Shoutbox, TorrentDetails, TorrentSummary, UploadPayload,
    UploadRequest,
};
use crate::tracker::transport::TrackerApi;
use crate::{CoreError, Result};

/// Search torrents, newest first.
///
/// # Errors
///
/// Returns an error if authentication or the search request fails.
pub async fn search<T: TrackerApi>(
    conn: &Connection<T>,
    query: &str,
    categories: &[i64],
    include_dead: bool,
) -> Result<Vec<TorrentSummary>> {
    conn.session().await?;
    let mut entries = conn.api().search(query, categories, include_dead).await?;
    // Stable, so same-second entries keep the server's relative order.
    entries.sort_by(|a, b| b.added.cmp(&a.added));
    Ok(entries)
}

/// Fetch a torrent record with the requested detail sections.
///
/// # Errors
///
/// Returns an error if authentication or the details request fails.
pub async fn details<T: TrackerApi>(
    conn: &Connection<T>,
    id: i64,
    sections: DetailSections,
) -> Result<TorrentDetails> {
    conn.session().await?;
    conn.api().details(id, sections).await
}

/// Resolve where a downloaded metadata file should land.
///
/// An empty hint means the server-suggested name in the current directory.
/// A hint without a `.torrent` suffix is treated as a directory to place the
/// server-suggested name in. Anything else is used verbatim.
#[must_use]
pub fn resolve_download_path(hint: &str, server_name: &str) -> PathBuf {
    if hint.is_empty() {
        PathBuf::from(server_name)
    } else if Path::new(hint).extension().is_some_and(|e| e == "torrent") {
        PathBuf::from(hint)
    } else {
        Path::new(hint).join(server_name)
    }
}

/// Download a torrent metadata file to disk.
///
/// Returns the path written and the number of bytes.
///
/// # Errors
///
/// Returns an error if authentication, the download request, or writing the
/// file fails.
pub async fn download<T: TrackerApi>(
    conn: &Connection<T>,
    id: i64,
    dest_hint: &str,
) -> Result<(PathBuf, usize)> {
    conn.session().await?;
    let (bytes, server_name) = conn.api().download(id).await?;
    let path = resolve_download_path(dest_hint, &server_name);
    fs::write(&path, &bytes)?;
    Ok((path, bytes.len()))
}

/// Read all local files of an upload request into memory.
///
/// Runs before any network traffic so a half-readable upload never reaches
/// the tracker.
///
/// # Errors
///
/// Returns an error if any referenced file cannot be read.
pub fn read_upload_files(request: &UploadRequest) -> Result<UploadPayload> {
    let description = fs::read_to_string(&request.description)?;
    let image2 = request.image2.as_deref().map(read_named).transpose()?;
    Ok(UploadPayload {
        torrent: read_named(&request.torrent)?,
        nfo: read_named(&request.nfo)?,
        image1: read_named(&request.image1)?,
        image2,
        description,
        name: request.name.clone(),
        category: request.category,
    })
}

fn read_named(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::Path(format!("no file name in {}", path.display())))?
        .to_string();
    Ok((name, fs::read(path)?))
}

/// Create a new upload. Returns the id of the created torrent.
///
/// # Errors
///
/// Returns an error if any local file cannot be read, or if authentication
/// or the upload request fails.
pub async fn upload<T: TrackerApi>(conn: &Connection<T>, request: &UploadRequest) -> Result<i64> {
    let payload = read_upload_files(request)?;
    conn.session().await?;
    conn.api().upload(payload).await
}

/// Thank the uploader of a torrent.
///
/// # Errors
///
/// Returns an error if authentication or the request fails, or
/// [`CoreError::Rejected`] if the server declined without a reason.
pub async fn thank<T: TrackerApi>(conn: &Connection<T>, id: i64) -> Result<()> {
    conn.session().await?;
    accepted(conn.api().thank(id).await?)
}

/// Post a comment on a torrent.
///
/// # Errors
///
/// Returns an error if authentication or the request fails, or
/// [`CoreError::Rejected`] if the server declined without a reason.
pub async fn comment<T: TrackerApi>(conn: &Connection<T>, id: i64, text: &str) -> Result<()> {
    conn.session().await?;
    accepted(conn.api().comment(id, text).await?)
}

/// Read the full available shoutbox backlog.
///
/// # Errors
///
/// Returns an error if authentication or the request fails.
pub async fn shout_read<T: TrackerApi>(
    conn: &Connection<T>,
    shoutbox: Shoutbox,
) -> Result<Vec<ShoutMessage>> {
    conn.session().await?;
    conn.api().shoutbox_read(shoutbox, 0).await
}

/// Post a message to a shoutbox.
///
/// # Errors
///
/// Returns an error if authentication or the request fails, or
/// [`CoreError::Rejected`] if the server declined without a reason.
pub async fn shout_write<T: TrackerApi>(
    conn: &Connection<T>,
    shoutbox: Shoutbox,
    text: &str,
) -> Result<()> {
    conn.session().await?;
    accepted(conn.api().shoutbox_write(shoutbox, text).await?)
}

fn accepted(verdict: bool) -> Result<()> {
    if verdict { Ok(()) } else { Err(CoreError::Rejected) }
}
