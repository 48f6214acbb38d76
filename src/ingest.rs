//! Ingestion pipeline: fetch listing pages and store their new entries.
//!
//! Pages are processed one at a time. A fetch error or a malformed entry
//! aborts the run; entries already stored are skipped silently. Entries
//! that precede a malformed one on the same page are stored before the run
//! aborts.

use crate::config::TargetConfig;
use crate::scrapers::{
    ExtractContext, SiteVariant, backnumber_urls, extract_announcements, fetch_page, variant_for,
};
use crate::store::AnnouncementStore;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use std::error::Error;
use tracing::{info, instrument};

/// Everything needed to turn listing pages into stored announcements.
pub struct Ingestion {
    http: Client,
    variant: Box<dyn SiteVariant>,
    ctx: ExtractContext,
    store: AnnouncementStore,
}

impl Ingestion {
    pub fn new(http: Client, config: &TargetConfig, store: AnnouncementStore, today: NaiveDate) -> Self {
        Self {
            http,
            variant: variant_for(config.variant_kind()),
            ctx: ExtractContext {
                base_url: config.base_url.clone(),
                today,
            },
            store,
        }
    }

    /// Store the entries of already-fetched page HTML. Returns inserted ids.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`](crate::scrapers::ParseError) of the first
    /// malformed entry, after the entries before it have been stored.
    #[instrument(level = "info", skip(self, html))]
    pub async fn save_html(&self, url: &str, html: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let extraction = extract_announcements(html, self.variant.as_ref(), &self.ctx);
        let found = extraction.announcements.len();
        let inserted = self.store.insert_new(extraction.announcements).await?;
        info!(found, inserted = inserted.len(), "Saved page");
        match extraction.failure {
            Some(e) => Err(e.into()),
            None => Ok(inserted),
        }
    }

    /// Fetch one page and store its entries.
    pub async fn save_page(&self, url: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let html = fetch_page(&self.http, url).await?;
        self.save_html(url, &html).await
    }

    /// Store the top page only.
    pub async fn save_new_page(&self, top_url: &str) -> Result<Vec<String>, Box<dyn Error>> {
        self.save_page(top_url).await
    }

    /// Store the top page, then every backnumber page it links to, in order.
    #[instrument(level = "info", skip(self))]
    pub async fn save_all_pages(&self, top_url: &str) -> Result<Vec<String>, Box<dyn Error>> {
        let top_html = fetch_page(&self.http, top_url).await?;
        let back_urls = backnumber_urls(&top_html, &self.ctx.base_url)?;
        info!(backnumbers = back_urls.len(), "Found backnumber pages");

        let mut inserted = self.save_html(top_url, &top_html).await?;
        let rest: Vec<Vec<String>> = stream::iter(back_urls)
            .then(|url| async move { self.save_page(&url).await })
            .try_collect()
            .await?;
        inserted.extend(rest.into_iter().flatten());
        info!(total_inserted = inserted.len(), "Saved all pages");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::VariantKind;

    fn config(target: &str) -> TargetConfig {
        TargetConfig {
            base_url: "https://www.example.jp/shop/".to_string(),
            top_url: "info.html".to_string(),
            target: target.to_string(),
            account: "bot".to_string(),
            debug_account: "bot_sandbox".to_string(),
            tweet_template: "{header}{body}{url}".to_string(),
            variant: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[tokio::test]
    async fn test_save_html_new_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = config("prismstone_newitem");
        assert_eq!(config.variant_kind(), VariantKind::NewItem);
        let store = AnnouncementStore::open(dir.path(), &config.target);
        let ingestion = Ingestion::new(Client::new(), &config, store.clone(), today());

        let html = r#"<div class="info_entry_inbox">
            <div><img src="img/new/b_item.png"></div>
            <div><img src="img/new/a_item.png"></div>
        </div>"#;
        let inserted = ingestion.save_html("https://www.example.jp/shop/info.html", html).await.unwrap();
        assert_eq!(inserted, vec!["b_item", "a_item"]);

        let again = ingestion.save_html("https://www.example.jp/shop/info.html", html).await.unwrap();
        assert!(again.is_empty());

        let pending = store.find_unpublished().await.unwrap();
        assert_eq!(pending[0].id, "a_item");
        assert_eq!(pending[0].header, "2024年3月4日(月)に追加されたニューアイテム");
    }

    #[tokio::test]
    async fn test_save_html_keeps_entries_before_malformed_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = config("prismstone");
        let store = AnnouncementStore::open(dir.path(), &config.target);
        let ingestion = Ingestion::new(Client::new(), &config, store.clone(), today());

        let html = r#"
            <div class="info_entry" id="ok"><h2>2023/12/1</h2><strong>A</strong>
              <div class="info_entry_inbox">a</div></div>
            <div class="info_entry" id="bad"><h2>2023/12/2</h2>
              <div class="info_entry_inbox">b</div></div>
            <div class="info_entry" id="after"><h2>2023/12/3</h2><strong>C</strong>
              <div class="info_entry_inbox">c</div></div>"#;
        assert!(ingestion.save_html("u", html).await.is_err());

        let ids: Vec<String> = store
            .find_unpublished()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["ok"]);
    }
}
