//! New-item grid scraper.
//!
//! Each grid cell is a `div` inside `div.info_entry_inbox` holding one or
//! more product images. The page carries no dates, so entries are stamped
//! with the fetch date and keyed by the first image's file stem, decoded
//! back from the percent-encoding the resolved URL applies.

use super::{ExtractContext, ParseError, SiteVariant, image_urls, resolve_in_dir};
use crate::models::Announcement;
use crate::utils::format_date_ja;
use once_cell::sync::Lazy;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use url::Url;

static ENTRY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.info_entry_inbox div").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct NewItemVariant;

impl SiteVariant for NewItemVariant {
    fn locate_entries<'a>(&self, document: &'a Html) -> Select<'a, 'static> {
        document.select(&ENTRY_SELECTOR)
    }

    fn normalize_entry(
        &self,
        entry: ElementRef<'_>,
        ctx: &ExtractContext,
    ) -> Result<Announcement, ParseError> {
        let images = image_urls(entry, |src| resolve_in_dir(&ctx.base_url, src))?;
        let first = images.first().ok_or(ParseError::MissingElement("img"))?;
        let id = file_stem(first).ok_or(ParseError::MissingAttribute {
            element: "img",
            attr: "src",
        })?;

        let header = format!("{}に追加されたニューアイテム", format_date_ja(ctx.today));
        Ok(Announcement::new(
            id,
            ctx.today,
            header,
            "",
            images.into_iter().map(String::from).collect(),
        ))
    }
}

/// File stem of the last path segment, percent-decoded.
fn file_stem(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let name = urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Path::new(&name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}
