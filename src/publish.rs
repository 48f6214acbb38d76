//! Posting stored announcements to the social feed.
//!
//! For each unpublished announcement, in `id` order, the publisher:
//!
//! 1. Renders the status text with [`StatusComposer`]
//! 2. Downloads up to [`MAX_MEDIA`] images to the download directory,
//!    skipping any that fail
//! 3. Uploads each downloaded image to obtain a media id
//! 4. Posts the status with the collected media ids
//! 5. Marks the announcement published
//!
//! Any error after image download propagates and stops the run; records
//! after the failing one stay unpublished until the next invocation.
//! Downloaded files are left in place.

use crate::models::Announcement;
use crate::status::StatusComposer;
use crate::store::AnnouncementStore;
use reqwest::Client;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Maximum number of images attached to one post.
pub const MAX_MEDIA: usize = 4;

/// The two feed operations the publisher needs.
pub trait SocialFeed {
    /// Upload an image file and return its media id.
    async fn upload_media(&self, path: &Path) -> Result<String, Box<dyn Error>>;

    /// Post `status` with the given media attached and return the post id.
    async fn post_status(&self, status: &str, media_ids: &[String])
    -> Result<String, Box<dyn Error>>;
}

/// Download `url` into `dir`, named after the URL's last path segment.
///
/// # Arguments
///
/// * `client` - HTTP client used for the request
/// * `url` - Absolute image URL
/// * `dir` - Existing directory the file is written into
///
/// # Returns
///
/// `Some(path)` of the written file, or `None` when the request failed in
/// transport, returned a non-success status, or its body could not be read.
/// Each of those is logged as a warning.
///
/// # Errors
///
/// Only a failure to write the file to `dir`.
#[instrument(level = "info", skip(client, dir))]
pub async fn download_image(
    client: &Client,
    url: &str,
    dir: &Path,
) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Image request failed; skipping");
            return Ok(None);
        }
    };
    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Image returned non-success status; skipping");
        return Ok(None);
    }
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Image body read failed; skipping");
            return Ok(None);
        }
    };

    let file_name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "image".to_string());
    let path = dir.join(file_name);
    fs::write(&path, &bytes).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
    Ok(Some(path))
}

/// Publishes announcements for one target through a [`SocialFeed`].
#[derive(Debug)]
pub struct Publisher<F> {
    feed: F,
    composer: StatusComposer,
    http: Client,
    download_dir: PathBuf,
}

impl<F: SocialFeed> Publisher<F> {
    pub fn new(feed: F, composer: StatusComposer, http: Client, download_dir: PathBuf) -> Self {
        Self {
            feed,
            composer,
            http,
            download_dir,
        }
    }

    /// Post one announcement. Does not touch the store.
    #[instrument(level = "info", skip_all, fields(id = %announcement.id))]
    pub async fn publish(&self, announcement: &Announcement) -> Result<String, Box<dyn Error>> {
        let status = self.composer.compose(announcement);
        let images: Vec<&String> = announcement.images.iter().take(MAX_MEDIA).collect();
        info!(%status, images = ?images, "Posting announcement");

        let mut media_ids = Vec::new();
        for url in images {
            if let Some(path) = download_image(&self.http, url, &self.download_dir).await? {
                media_ids.push(self.feed.upload_media(&path).await?);
            }
        }

        let post_id = self.feed.post_status(&status, &media_ids).await?;
        info!(%post_id, media = media_ids.len(), "Posted announcement");
        Ok(post_id)
    }

    /// Publish every unpublished announcement in `store`, in `id` order.
    ///
    /// Each record is marked published right after its post succeeds.
    ///
    /// # Returns
    ///
    /// The number of announcements published.
    ///
    /// # Errors
    ///
    /// The first store, upload or post failure. Records from the failing
    /// one onwards stay unpublished.
    #[instrument(level = "info", skip_all, fields(store = %store.path().display()))]
    pub async fn publish_pending(&self, store: &AnnouncementStore) -> Result<usize, Box<dyn Error>> {
        let pending = store.find_unpublished().await?;
        let mut published = 0;
        for announcement in &pending {
            self.publish(announcement).await?;
            store.mark_published(&announcement.id).await?;
            published += 1;
        }
        info!(published, "Finished publishing");
        Ok(published)
    }
}
