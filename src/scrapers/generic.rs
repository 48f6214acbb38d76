//! Generic news block scraper.
//!
//! News posts are `div.info_entry` blocks carrying their own `id`, a heading
//! with the post date (`YYYY/M/D`), a bold title and an `.info_entry_inbox`
//! container with the text and images.

use super::{ExtractContext, ParseError, SiteVariant, image_urls, resolve_in_dir, text_of};
use crate::models::Announcement;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};

static ENTRY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("div.info_entry").unwrap());
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").unwrap());
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".info_entry_inbox").unwrap());
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{4})/([0-9]{1,2})/([0-9]{1,2})").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct GenericVariant;

/// Find the first `YYYY/M/D` in `text` and parse it.
pub fn find_date(text: &str) -> Result<NaiveDate, ParseError> {
    let caps = DATE_RE
        .captures(text)
        .ok_or_else(|| ParseError::NoDateMatch(text.trim().to_string()))?;
    let invalid = || ParseError::InvalidDate(caps[0].to_string());
    let year = caps[1].parse().map_err(|_| invalid())?;
    let month = caps[2].parse().map_err(|_| invalid())?;
    let day = caps[3].parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

impl SiteVariant for GenericVariant {
    fn locate_entries<'a>(&self, document: &'a Html) -> Select<'a, 'static> {
        document.select(&ENTRY_SELECTOR)
    }

    fn normalize_entry(
        &self,
        entry: ElementRef<'_>,
        ctx: &ExtractContext,
    ) -> Result<Announcement, ParseError> {
        let id = entry.value().attr("id").ok_or(ParseError::MissingAttribute {
            element: "div.info_entry",
            attr: "id",
        })?;
        let heading = entry
            .select(&HEADING_SELECTOR)
            .next()
            .ok_or(ParseError::MissingElement("h2"))?;
        let date = find_date(&text_of(heading))?;
        let title = entry
            .select(&TITLE_SELECTOR)
            .next()
            .ok_or(ParseError::MissingElement("strong"))?;
        let container = entry
            .select(&BODY_SELECTOR)
            .next()
            .ok_or(ParseError::MissingElement(".info_entry_inbox"))?;

        let header = text_of(title).replace('\r', "");
        let body = text_of(container).replace('\r', "").trim().to_string();
        let images = image_urls(container, |src| resolve_in_dir(&ctx.base_url, src))?;

        Ok(Announcement::new(
            id,
            date,
            header,
            body,
            images.into_iter().map(String::from).collect(),
        ))
    }
}
