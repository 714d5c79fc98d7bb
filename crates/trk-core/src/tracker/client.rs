//! HTTP implementation of the tracker transport.
//!
//! The tracker is a classic PHP-era private tracker: cookie-authenticated
//! endpoints (`takelogin.php`, `browse.php`, `details.php`, ...) that serve
//! structured responses for API clients. Authentication state is the `uid` /
//! `pass` cookie pair; the jar keeps it across requests and picks up any
//! rotation the server performs, which `session_state` exposes for
//! persistence on exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};

use crate::tracker::models::{
    Credentials, DetailSections, Session, ShoutMessage, Shoutbox, TorrentDetails, TorrentSummary,
    UploadPayload,
};
use crate::tracker::transport::TrackerApi;
use crate::{CoreError, Result};

/// Tracker client backed by reqwest and a shared cookie jar.
#[derive(Debug)]
pub struct HttpTracker {
    http: Client,
    jar: Arc<Jar>,
    base: Url,
    uid: AtomicI64,
}

impl HttpTracker {
    /// Create a new client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or HTTP client creation fails.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| CoreError::Config(format!("invalid tracker URL '{base_url}': {e}")))?;

        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| CoreError::Other(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http,
            jar,
            base,
            uid: AtomicI64::new(0),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| CoreError::Config(format!("building URL for {path}: {e}")))
    }

    /// Cookie set for the base URL in `Cookie` header form.
    fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|v| v.to_str().ok().map(String::from))
    }

    async fn check(&self, response: Response, what: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(CoreError::Api(format!("{what} failed: {status} - {text}")))
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
        what: &str,
    ) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| CoreError::Serialization(format!("parsing {what} response: {e}")))
    }

    /// POST a form to a boolean-result endpoint and read the verdict.
    async fn post_verdict(&self, path: &str, form: &[(&str, String)], what: &str) -> Result<bool> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("{what} request failed: {e}")))?;
        let response = self.check(response, what).await?;
        let verdict: Verdict = self.parse_json(response, what).await?;
        Ok(verdict.success)
    }
}

/// Boolean result envelope used by thank/comment/shoutbox-write endpoints.
#[derive(Debug, serde::Deserialize)]
struct Verdict {
    success: bool,
}

/// Upload result envelope.
#[derive(Debug, serde::Deserialize)]
struct Created {
    id: i64,
}

#[async_trait]
impl TrackerApi for HttpTracker {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let url = self.endpoint("takelogin.php")?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("pin", credentials.pin.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("login request failed: {e}")))?;
        self.check(response, "login").await?;

        // The server answers a successful login with the uid/pass cookie
        // pair; no uid cookie means the credentials were not accepted.
        let cookies = self
            .cookie_header()
            .ok_or_else(|| CoreError::Auth("login did not set any cookies".to_string()))?;
        let uid = uid_from_cookies(&cookies)
            .ok_or_else(|| CoreError::Auth("login rejected (no uid cookie)".to_string()))?;

        self.uid.store(uid, Ordering::SeqCst);
        log::debug!("logged in as uid {uid}");

        Ok(Session { uid, cookies })
    }

    fn adopt(&self, session: &Session) {
        for pair in session.cookies.split("; ") {
            if !pair.is_empty() {
                self.jar.add_cookie_str(pair, &self.base);
            }
        }
        self.uid.store(session.uid, Ordering::SeqCst);
    }

    fn session_state(&self) -> Option<Session> {
        let uid = self.uid.load(Ordering::SeqCst);
        self.cookie_header()
            .map(|cookies| Session { uid, cookies })
    }

    async fn search(
        &self,
        query: &str,
        categories: &[i64],
        include_dead: bool,
    ) -> Result<Vec<TorrentSummary>> {
        let mut url = self.endpoint("browse.php")?;
        {
            let mut qs = url.query_pairs_mut();
            qs.append_pair("search", query);
            if !categories.is_empty() {
                let cats = categories
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                qs.append_pair("c", &cats);
            }
            if include_dead {
                qs.append_pair("dead", "1");
            }
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("search request failed: {e}")))?;
        let response = self.check(response, "search").await?;
        self.parse_json(response, "search").await
    }

    async fn details(&self, id: i64, sections: DetailSections) -> Result<TorrentDetails> {
        let mut url = self.endpoint("details.php")?;
        {
            let mut qs = url.query_pairs_mut();
            qs.append_pair("id", &id.to_string());
            if sections.files {
                qs.append_pair("filelist", "1");
            }
            if sections.peers {
                qs.append_pair("dllist", "1");
            }
            if sections.snatches {
                qs.append_pair("tosnatch", "1");
            }
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("details request failed: {e}")))?;
        let response = self.check(response, "details").await?;
        self.parse_json(response, "details").await
    }

    async fn download(&self, id: i64) -> Result<(Vec<u8>, String)> {
        let mut url = self.endpoint("download.php")?;
        url.query_pairs_mut().append_pair("torrent", &id.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("download request failed: {e}")))?;
        let response = self.check(response, "download").await?;

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| format!("{id}.torrent"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Api(format!("reading download body: {e}")))?;

        Ok((bytes.to_vec(), filename))
    }

    async fn upload(&self, payload: UploadPayload) -> Result<i64> {
        let mut form = Form::new()
            .text("name", payload.name)
            .text("type", payload.category.to_string())
            .text("descr", payload.description)
            .part(
                "file",
                Part::bytes(payload.torrent.1).file_name(payload.torrent.0),
            )
            .part("nfo", Part::bytes(payload.nfo.1).file_name(payload.nfo.0))
            .part(
                "pic1",
                Part::bytes(payload.image1.1).file_name(payload.image1.0),
            );
        if let Some((name, bytes)) = payload.image2 {
            form = form.part("pic2", Part::bytes(bytes).file_name(name));
        }

        let url = self.endpoint("upload.php")?;
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("upload request failed: {e}")))?;
        let response = self.check(response, "upload").await?;
        let created: Created = self.parse_json(response, "upload").await?;
        Ok(created.id)
    }

    async fn thank(&self, id: i64) -> Result<bool> {
        self.post_verdict("thanks.php", &[("id", id.to_string())], "thank")
            .await
    }

    async fn comment(&self, id: i64, text: &str) -> Result<bool> {
        self.post_verdict(
            "comment.php",
            &[("tid", id.to_string()), ("text", text.to_string())],
            "comment",
        )
        .await
    }

    async fn shoutbox_read(&self, shoutbox: Shoutbox, since: i64) -> Result<Vec<ShoutMessage>> {
        let mut url = self.endpoint("shoutbox.php")?;
        url.query_pairs_mut()
            .append_pair("b", &shoutbox.channel_id().to_string())
            .append_pair("lid", &since.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("shoutbox read request failed: {e}")))?;
        let response = self.check(response, "shoutbox read").await?;
        self.parse_json(response, "shoutbox read").await
    }

    async fn shoutbox_write(&self, shoutbox: Shoutbox, text: &str) -> Result<bool> {
        self.post_verdict(
            "shoutbox.php",
            &[
                ("b", shoutbox.channel_id().to_string()),
                ("shout", text.to_string()),
            ],
            "shoutbox write",
        )
        .await
    }
}

/// Extract `filename="..."` from a Content-Disposition header value.
fn disposition_filename(value: &str) -> Option<String> {
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.trim().trim_matches('"').split(';').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Pull the numeric uid out of a cookie header string.
fn uid_from_cookies(cookies: &str) -> Option<i64> {
    cookies.split("; ").find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == "uid" {
            value.trim().parse::<i64>().ok().filter(|uid| *uid > 0)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_parsed_from_content_disposition() {
        assert_eq!(
            disposition_filename("attachment; filename=\"my.release.torrent\""),
            Some("my.release.torrent".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; filename=plain.torrent"),
            Some("plain.torrent".to_string())
        );
        assert_eq!(disposition_filename("attachment"), None);
    }

    #[test]
    fn uid_cookie_is_extracted() {
        assert_eq!(uid_from_cookies("uid=1337; pass=deadbeef"), Some(1337));
        assert_eq!(uid_from_cookies("pass=deadbeef"), None);
        assert_eq!(uid_from_cookies("uid=0; pass=deadbeef"), None);
        assert_eq!(uid_from_cookies("uid=junk"), None);
    }
}
