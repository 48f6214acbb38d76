//! Listing page scrapers for the shop's news pages.
//!
//! Ingestion follows a fetch, locate, normalize pattern:
//!
//! 1. **Fetching**: [`fetch_page`] downloads a listing page as UTF-8 text
//! 2. **Locating**: [`SiteVariant::locate_entries`] yields the raw entry fragments
//! 3. **Normalizing**: [`SiteVariant::normalize_entry`] turns one fragment into an
//!    [`Announcement`]
//!
//! # Supported Variants
//!
//! | Variant | Module | Entry selector | `id` source |
//! |---------|--------|----------------|-------------|
//! | New items | [`new_item`] | `div.info_entry_inbox div` | first image file stem |
//! | Shop list | [`shop_list`] | `table.shoptable th` | shop name |
//! | Generic news | [`generic`] | `div.info_entry` | `id` attribute |
//!
//! Locating never validates fragments. A malformed fragment fails in its
//! variant's normalizer with a [`ParseError`], and [`extract_announcements`]
//! stops at the first failure.

use crate::models::Announcement;
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::html::Select;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub mod generic;
pub mod new_item;
pub mod shop_list;

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static BACKNUMBER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".bacnnum_link a").unwrap());

/// Failure to normalize one entry fragment.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("entry has no `{0}` element")]
    MissingElement(&'static str),
    #[error("`{element}` has no `{attr}` attribute")]
    MissingAttribute {
        element: &'static str,
        attr: &'static str,
    },
    #[error("no date found in `{0}`")]
    NoDateMatch(String),
    #[error("`{0}` is not a valid date")]
    InvalidDate(String),
    #[error("cannot resolve `{href}`: {source}")]
    InvalidUrl {
        href: String,
        #[source]
        source: url::ParseError,
    },
}

/// Which parsing rules a target uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    NewItem,
    ShopList,
    Generic,
}

impl VariantKind {
    /// Pick the rules from a target name: `*_newitem`, `*_shoplist`, else generic.
    pub fn infer_from_target(target: &str) -> Self {
        if target.ends_with("_newitem") {
            VariantKind::NewItem
        } else if target.ends_with("_shoplist") {
            VariantKind::ShopList
        } else {
            VariantKind::Generic
        }
    }
}

/// Inputs a normalizer needs besides the fragment itself.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    /// Site root used to resolve relative image links.
    pub base_url: String,
    /// Fetch date, used where the page carries no date.
    pub today: NaiveDate,
}

/// Site-specific rules for finding and parsing entries.
pub trait SiteVariant {
    /// Lazily select the entry fragments of a parsed page.
    fn locate_entries<'a>(&self, document: &'a Html) -> Select<'a, 'static>;

    /// Convert one fragment into an announcement.
    fn normalize_entry(
        &self,
        entry: ElementRef<'_>,
        ctx: &ExtractContext,
    ) -> Result<Announcement, ParseError>;
}

/// Build the rules for a variant.
pub fn variant_for(kind: VariantKind) -> Box<dyn SiteVariant> {
    match kind {
        VariantKind::NewItem => Box::new(new_item::NewItemVariant),
        VariantKind::ShopList => Box::new(shop_list::ShopListVariant),
        VariantKind::Generic => Box::new(generic::GenericVariant),
    }
}

/// Fetch a page and decode it as UTF-8 regardless of the declared charset.
///
/// Invalid sequences are replaced with U+FFFD. A non-success status is
/// logged and the body is returned anyway.
///
/// # Errors
///
/// Transport failures and body read failures.
#[instrument(level = "info", skip(client))]
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Page returned non-success status");
    }
    let bytes = response.bytes().await?;
    let html = String::from_utf8_lossy(&bytes).into_owned();
    info!(bytes = bytes.len(), "Fetched page");
    debug!(preview = %truncate_for_log(&html, 300), "Page content");
    Ok(html)
}

/// Entries normalized from one page, up to the first malformed one.
#[derive(Debug)]
pub struct Extraction {
    /// Announcements preceding the failure, in document order.
    pub announcements: Vec<Announcement>,
    /// The failure that stopped extraction, if any.
    pub failure: Option<ParseError>,
}

impl Extraction {
    /// All announcements, or the failure if one occurred.
    pub fn into_result(self) -> Result<Vec<Announcement>, ParseError> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.announcements),
        }
    }
}

/// Parse a page and normalize its entries in order, stopping at the first failure.
///
/// # Arguments
///
/// * `html` - Page source
/// * `variant` - Rules used to locate and normalize entries
/// * `ctx` - Base URL and fetch date
///
/// # Returns
///
/// An [`Extraction`] holding every announcement normalized before the first
/// malformed entry, and that entry's [`ParseError`] if there was one.
/// Entries after a malformed one are never looked at.
pub fn extract_announcements(
    html: &str,
    variant: &dyn SiteVariant,
    ctx: &ExtractContext,
) -> Extraction {
    let document = Html::parse_document(html);
    let mut announcements = Vec::new();
    let mut failure = None;
    for entry in variant.locate_entries(&document) {
        match variant.normalize_entry(entry, ctx) {
            Ok(announcement) => announcements.push(announcement),
            Err(e) => {
                warn!(error = %e, parsed = announcements.len(), "Malformed entry; stopping page");
                failure = Some(e);
                break;
            }
        }
    }
    debug!(count = announcements.len(), "Extracted announcements");
    Extraction {
        announcements,
        failure,
    }
}

/// Absolute URLs of the archived listing pages linked from the top page.
///
/// # Arguments
///
/// * `html` - Top page source
/// * `base_url` - Directory the `.bacnnum_link a` hrefs are relative to
///
/// # Errors
///
/// A link without `href`, or one that does not resolve against `base_url`.
pub fn backnumber_urls(html: &str, base_url: &str) -> Result<Vec<String>, ParseError> {
    let document = Html::parse_document(html);
    document
        .select(&BACKNUMBER_SELECTOR)
        .map(|a| -> Result<String, ParseError> {
            let href = a.value().attr("href").ok_or(ParseError::MissingAttribute {
                element: ".bacnnum_link a",
                attr: "href",
            })?;
            Ok(resolve_in_dir(base_url, href)
                .map_err(|source| ParseError::InvalidUrl {
                    href: href.to_string(),
                    source,
                })?
                .to_string())
        })
        .collect()
}

/// Resolve `relative` treating `base` as a directory even without a trailing slash.
pub fn resolve_in_dir(base: &str, relative: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(relative)
}

/// Resolve `relative` against `base` with ordinary URL reference rules.
pub fn resolve_against(base: &str, relative: &str) -> Result<Url, url::ParseError> {
    Url::parse(base)?.join(relative)
}

/// All text under an element, concatenated.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Resolve the `src` of every `img` under `element`, in document order.
pub(crate) fn image_urls<F>(element: ElementRef<'_>, resolve: F) -> Result<Vec<Url>, ParseError>
where
    F: Fn(&str) -> Result<Url, url::ParseError>,
{
    element
        .select(&IMG_SELECTOR)
        .map(|img| -> Result<Url, ParseError> {
            let src = img.value().attr("src").ok_or(ParseError::MissingAttribute {
                element: "img",
                attr: "src",
            })?;
            resolve(src).map_err(|source| ParseError::InvalidUrl {
                href: src.to_string(),
                source,
            })
        })
        .collect()
}
