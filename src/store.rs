//! Document store for announcements, one collection per target.
//!
//! Each collection is a JSON object keyed by announcement `id`, kept at
//! `<data_dir>/<target>/entries.json`. The file is re-read for every
//! operation and rewritten after every mutation, so separate invocations
//! always see each other's writes. A single writer is assumed.
//!
//! Writes go to a sibling `entries.json.tmp` that is then renamed over the
//! collection file, so an interrupted write never leaves a truncated
//! collection behind.
//!
//! # Layout
//!
//! ```text
//! data_dir/
//! └── prismstone_info/
//!     ├── entries.json
//!     └── entries.json.tmp   (only while a write is in flight)
//! ```

use crate::models::Announcement;
use std::collections::BTreeMap;
use std::error::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

type Collection = BTreeMap<String, Announcement>;

/// Store gateway for one target's announcements.
#[derive(Debug, Clone)]
pub struct AnnouncementStore {
    path: PathBuf,
}

impl AnnouncementStore {
    /// Open the collection for `target` under `data_dir`. Nothing is read yet.
    pub fn open(data_dir: &Path, target: &str) -> Self {
        Self {
            path: data_dir.join(target).join("entries.json"),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Collection, Box<dyn Error>> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Collection file missing; starting empty");
                Ok(Collection::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, docs: &Collection) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(docs)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &self.path).await?;
        debug!(path = %self.path.display(), count = docs.len(), "Wrote collection");
        Ok(())
    }

    /// Insert records whose `id` is not stored yet, unpublished.
    ///
    /// Records already present are left untouched, whatever their content.
    /// The file is only rewritten when something was inserted.
    ///
    /// # Returns
    ///
    /// The inserted ids, in input order.
    ///
    /// # Errors
    ///
    /// Reading, parsing or writing the collection file.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn insert_new<I>(&self, records: I) -> Result<Vec<String>, Box<dyn Error>>
    where
        I: IntoIterator<Item = Announcement>,
    {
        let mut docs = self.load().await?;
        let mut inserted = Vec::new();
        for mut record in records {
            if docs.contains_key(&record.id) {
                debug!(id = %record.id, "Already stored; skipping");
                continue;
            }
            record.published = false;
            inserted.push(record.id.clone());
            docs.insert(record.id.clone(), record);
        }

        if !inserted.is_empty() {
            self.save(&docs).await?;
        }
        info!(count = inserted.len(), ids = ?inserted, "Inserted new announcements");
        Ok(inserted)
    }

    /// All unpublished records, ordered by `id`.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn find_unpublished(&self) -> Result<Vec<Announcement>, Box<dyn Error>> {
        let docs = self.load().await?;
        let pending: Vec<Announcement> = docs.into_values().filter(|a| !a.published).collect();
        info!(count = pending.len(), "Loaded unpublished announcements");
        Ok(pending)
    }

    /// Flag a record as published. A missing `id` is logged and ignored.
    #[instrument(level = "info", skip(self))]
    pub async fn mark_published(&self, id: &str) -> Result<(), Box<dyn Error>> {
        let mut docs = self.load().await?;
        match docs.get_mut(id) {
            Some(doc) => {
                doc.published = true;
                self.save(&docs).await?;
                info!("Marked announcement published");
            }
            None => warn!("Announcement to mark published not found"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{ExtractContext, VariantKind, extract_announcements, variant_for};
    use chrono::NaiveDate;

    fn record(id: &str) -> Announcement {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        Announcement::new(id, date, format!("header {id}"), "", vec![])
    }

    #[tokio::test]
    async fn test_insert_new_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");

        let first = store.insert_new(vec![record("a"), record("b")]).await.unwrap();
        assert_eq!(first, vec!["a", "b"]);

        let mut changed = record("a");
        changed.header = "changed".to_string();
        let second = store.insert_new(vec![changed, record("c")]).await.unwrap();
        assert_eq!(second, vec!["c"]);

        let all = store.find_unpublished().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].header, "header a");
    }

    #[tokio::test]
    async fn test_insert_forces_unpublished() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");
        let mut r = record("a");
        r.published = true;
        store.insert_new(vec![r]).await.unwrap();
        assert_eq!(store.find_unpublished().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_unpublished_orders_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");
        store
            .insert_new(vec![record("b"), record("a"), record("c")])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .find_unpublished()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mark_published() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");
        store.insert_new(vec![record("a"), record("b")]).await.unwrap();

        store.mark_published("a").await.unwrap();
        store.mark_published("missing").await.unwrap();

        let pending = store.find_unpublished().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");
    }

    #[tokio::test]
    async fn test_targets_are_separate_collections() {
        let dir = tempfile::tempdir().unwrap();
        let news = AnnouncementStore::open(dir.path(), "news");
        let shops = AnnouncementStore::open(dir.path(), "shops");
        news.insert_new(vec![record("a")]).await.unwrap();

        assert!(shops.find_unpublished().await.unwrap().is_empty());
        assert_eq!(shops.insert_new(vec![record("a")]).await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_ingesting_same_page_twice_is_idempotent() {
        let html = r#"
            <div class="info_entry" id="n2"><h2>2023/12/2</h2><strong>B</strong>
              <div class="info_entry_inbox">two</div></div>
            <div class="info_entry" id="n1"><h2>2023/12/1</h2><strong>A</strong>
              <div class="info_entry_inbox">one</div></div>"#;
        let ctx = ExtractContext {
            base_url: "https://www.example.jp/".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        };
        let variant = variant_for(VariantKind::Generic);
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "news");

        let docs = extract_announcements(html, variant.as_ref(), &ctx)
            .into_result()
            .unwrap();
        assert_eq!(store.insert_new(docs).await.unwrap(), vec!["n2", "n1"]);

        let docs = extract_announcements(html, variant.as_ref(), &ctx)
            .into_result()
            .unwrap();
        assert!(store.insert_new(docs).await.unwrap().is_empty());
        assert_eq!(store.find_unpublished().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");
        store.insert_new(vec![record("a")]).await.unwrap();
        store.insert_new(vec![record("b")]).await.unwrap();
        store.mark_published("a").await.unwrap();

        let files: Vec<String> = std::fs::read_dir(dir.path().join("shop"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["entries.json"]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let docs: Collection = serde_json::from_str(&raw).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs["a"].published);
        assert!(!docs["b"].published);
    }

    #[tokio::test]
    async fn test_stale_staging_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::open(dir.path(), "shop");
        store.insert_new(vec![record("a")]).await.unwrap();
        std::fs::write(store.path().with_extension("json.tmp"), "{\"trunc").unwrap();

        assert_eq!(store.find_unpublished().await.unwrap().len(), 1);
        assert_eq!(store.insert_new(vec![record("b")]).await.unwrap(), vec!["b"]);
        assert_eq!(store.find_unpublished().await.unwrap().len(), 2);
    }
}
