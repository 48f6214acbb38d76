//! Data model for scraped announcements.
//!
//! [`Announcement`] is the only persisted entity. It is created during
//! ingestion, stored once per `id`, and later flipped to `published` by the
//! publisher after a successful post.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single news, shop or item entry scraped from a listing page.
///
/// # Fields
///
/// * `id` - Stable identifier derived from page content; the dedup key
/// * `date` - Calendar date the announcement applies to
/// * `header` - Short title, may embed a formatted date or a map link
/// * `body` - Free text, possibly empty
/// * `images` - Absolute image URLs in document order
/// * `published` - Whether the entry has been posted to the feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Announcement {
    /// Identifier unique within a target's collection.
    pub id: String,
    /// Date parsed from the page, or the fetch date.
    pub date: NaiveDate,
    /// Title line.
    pub header: String,
    /// Description text.
    #[serde(default)]
    pub body: String,
    /// Absolute image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Set once the entry has been posted.
    #[serde(default)]
    pub published: bool,
}

impl Announcement {
    /// Build an unpublished announcement.
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        header: impl Into<String>,
        body: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            header: header.into(),
            body: body.into(),
            images,
            published: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_announcement_is_unpublished() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let a = Announcement::new("item01", date, "header", "", vec![]);
        assert_eq!(a.id, "item01");
        assert!(!a.published);
    }

    #[test]
    fn test_announcement_serialization() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let a = Announcement::new(
            "info_123",
            date,
            "お知らせ",
            "本文",
            vec!["https://example.com/img/a.jpg".to_string()],
        );

        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"date\":\"2023-12-01\""));
        assert!(json.contains("\"published\":false"));
    }

    #[test]
    fn test_announcement_deserialization_defaults() {
        let json = r#"{
            "id": "shop",
            "date": "2024-01-02",
            "header": "h"
        }"#;

        let a: Announcement = serde_json::from_str(json).unwrap();
        assert_eq!(a.body, "");
        assert!(a.images.is_empty());
        assert!(!a.published);
    }
}
