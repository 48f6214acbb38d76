//! Shop-list table scraper.
//!
//! The shop table lays each shop out as a header row (`th` with the shop
//! name) followed by a row of cells holding the shop photos and the address.
//! The first cell without an image is the address; scanning stops there.

use super::{ExtractContext, ParseError, SiteVariant, image_urls, resolve_against, text_of};
use crate::models::Announcement;
use once_cell::sync::Lazy;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/";

static ENTRY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.shoptable th").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct ShopListVariant;

impl SiteVariant for ShopListVariant {
    fn locate_entries<'a>(&self, document: &'a Html) -> Select<'a, 'static> {
        document.select(&ENTRY_SELECTOR)
    }

    fn normalize_entry(
        &self,
        entry: ElementRef<'_>,
        ctx: &ExtractContext,
    ) -> Result<Announcement, ParseError> {
        let name = text_of(entry).trim().to_string();

        let row = entry
            .parent()
            .and_then(|header_row| header_row.next_siblings().find_map(ElementRef::wrap))
            .ok_or(ParseError::MissingElement("tr"))?;

        let mut images = Vec::new();
        let mut address = None;
        for cell in row.select(&CELL_SELECTOR) {
            if cell.select(&IMG_SELECTOR).next().is_some() {
                images = image_urls(row, |src| resolve_against(&ctx.base_url, src))?;
                continue;
            }
            address = Some(text_of(cell).trim().replace('\r', ""));
            break;
        }
        let address = address.ok_or(ParseError::MissingElement("address td"))?;
        let area = address
            .split_whitespace()
            .next()
            .ok_or(ParseError::MissingElement("address text"))?;

        let map_url = format!("{MAP_SEARCH_URL}{}", urlencoding::encode(area));
        let header = format!("「{name}」が追加されました。\n地図：{map_url}");

        Ok(Announcement::new(
            name,
            ctx.today,
            header,
            "",
            images.into_iter().map(String::from).collect(),
        ))
    }
}
