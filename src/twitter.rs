//! X/Twitter v2 client implementing [`SocialFeed`].
//!
//! Uses an OAuth 2.0 user-context bearer token with the `tweet.write` and
//! `media.write` scopes. Only media upload and post creation are wrapped.
//! The token never appears in logs or in `Debug` output.

use crate::publish::SocialFeed;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

const API_BASE: &str = "https://api.x.com/2";

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct UploadedMedia {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<NewPostMedia<'a>>,
}

#[derive(Debug, Serialize)]
struct NewPostMedia<'a> {
    media_ids: &'a [String],
}

impl<'a> NewPost<'a> {
    fn new(text: &'a str, media_ids: &'a [String]) -> Self {
        let media = (!media_ids.is_empty()).then_some(NewPostMedia { media_ids });
        Self { text, media }
    }
}

#[derive(Clone)]
pub struct TwitterApi {
    http: Client,
    bearer: String,
    base_url: String,
}

impl TwitterApi {
    /// Client for the public X API.
    pub fn new(http: Client, bearer_token: String) -> Self {
        Self::with_base_url(http, bearer_token, API_BASE)
    }

    /// Client for an API rooted at `base_url`, e.g. a proxy or a local stub.
    pub fn with_base_url(http: Client, bearer_token: String, base_url: impl Into<String>) -> Self {
        Self {
            http,
            bearer: bearer_token,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl fmt::Debug for TwitterApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterApi")
            .field("base_url", &self.base_url)
            .field("bearer", &"<redacted>")
            .finish()
    }
}

impl SocialFeed for TwitterApi {
    #[instrument(level = "info", skip(self, path), fields(path = %path.display()))]
    async fn upload_media(&self, path: &Path) -> Result<String, Box<dyn Error>> {
        let bytes = fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", Part::bytes(bytes).file_name(file_name));

        let uploaded: DataEnvelope<UploadedMedia> = self
            .http
            .post(self.endpoint("media/upload"))
            .bearer_auth(&self.bearer)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(media_id = %uploaded.data.id, "Uploaded media");
        Ok(uploaded.data.id)
    }

    #[instrument(level = "info", skip(self, status))]
    async fn post_status(
        &self,
        status: &str,
        media_ids: &[String],
    ) -> Result<String, Box<dyn Error>> {
        let created: DataEnvelope<CreatedPost> = self
            .http
            .post(self.endpoint("tweets"))
            .bearer_auth(&self.bearer)
            .json(&NewPost::new(status, media_ids))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(post_id = %created.data.id, "Created post");
        Ok(created.data.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Answers every request with `body` and forwards its request head.
    async fn serve_json(body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 4096];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        (format!("http://{addr}/2"), rx)
    }

    #[test]
    fn test_new_post_without_media_omits_field() {
        let json = serde_json::to_value(NewPost::new("hello", &[])).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hello" }));
    }

    #[test]
    fn test_new_post_with_media() {
        let ids = vec!["1".to_string(), "2".to_string()];
        let json = serde_json::to_value(NewPost::new("hi", &ids)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "text": "hi", "media": { "media_ids": ["1", "2"] } })
        );
    }

    #[test]
    fn test_parse_upload_response() {
        let body = r#"{"data":{"id":"1880028106020515840","media_key":"3_1880028106020515840"}}"#;
        let parsed: DataEnvelope<UploadedMedia> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.id, "1880028106020515840");
    }

    #[test]
    fn test_debug_redacts_token() {
        let api = TwitterApi::new(Client::new(), "secret-token".to_string());
        let out = format!("{api:?}");
        assert!(!out.contains("secret-token"));
        assert_eq!(api.endpoint("tweets"), "https://api.x.com/2/tweets");
    }

    #[test]
    fn test_endpoint_uses_custom_base() {
        let api = TwitterApi::with_base_url(Client::new(), "t".to_string(), "http://localhost:8080/2/");
        assert_eq!(api.endpoint("media/upload"), "http://localhost:8080/2/media/upload");
    }

    #[tokio::test]
    async fn test_post_status_against_custom_base() {
        let (base, mut requests) = serve_json(r#"{"data":{"id":"42","text":"hi"}}"#).await;
        let api = TwitterApi::with_base_url(Client::new(), "secret-token".to_string(), base);

        let post_id = api.post_status("hi", &[]).await.unwrap();
        assert_eq!(post_id, "42");

        let head = requests.recv().await.unwrap();
        assert!(head.starts_with("POST /2/tweets HTTP/1.1"));
        assert!(head.to_lowercase().contains("authorization: bearer secret-token"));
    }
}
