//! Status text composition under the feed's length budget.
//!
//! A post may hold at most [`STATUS_MAX_LEN`] characters, and the platform
//! rewrites every URL to a shortened link of [`SHORTENED_URL_LEN`]
//! characters whatever its real length. Composition therefore runs in two
//! passes:
//!
//! 1. Fill `{date}` and `{header}`, leaving `{body}` and `{url}` as literal
//!    placeholders. Escaped braces (`{{`, `}}`) and braces inside the
//!    header stay escaped so the second pass cannot mistake them for tokens.
//! 2. Derive the body budget from the length of that intermediate text
//!    (escaped braces counted once),
//!    truncate the body to it, append `…`, then fill `{body}` and `{url}`.
//!
//! # Budget derivation
//!
//! ```text
//! max_body_len = 140 - len(status_with_placeholders) + 5 - 23 + 5
//! ```
//!
//! The intermediate text still contains `{url}`, five characters that will
//! be replaced by a link counted as 23, hence `+ 5 - 23`. The second `+ 5`
//! comes from the six-character `{body}` placeholder, which is also still
//! counted, minus one character for the appended ellipsis. If the platform's
//! shortened-link width changes, [`SHORTENED_URL_LEN`] is the only input to
//! update. The result is not re-validated after rendering.

use crate::models::Announcement;
use crate::utils::char_prefix;
use tracing::debug;

/// Maximum post length in characters.
pub const STATUS_MAX_LEN: i64 = 140;
/// Width the platform counts for any URL (`https://t.co/xxxxxxxxxx`).
pub const SHORTENED_URL_LEN: i64 = 23;
/// Length of the `{url}` placeholder counted in the intermediate text.
const URL_PLACEHOLDER_LEN: i64 = 5;
/// Length of the `{body}` placeholder, less the appended ellipsis.
const BODY_PLACEHOLDER_SLACK: i64 = 5;

const ELLIPSIS: char = '…';

/// Body budget for an intermediate status of `fixed_len` characters.
///
/// May be negative when the fixed part alone exceeds the budget.
pub fn max_body_len(fixed_len: usize) -> i64 {
    STATUS_MAX_LEN - fixed_len as i64 + URL_PLACEHOLDER_LEN - SHORTENED_URL_LEN
        + BODY_PLACEHOLDER_SLACK
}

/// Replace `{name}` tokens in a single left-to-right pass.
///
/// `{{` and `}}` render as literal `{` and `}`. Tokens with no matching key
/// are kept literally, and substituted values are never rescanned.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    fill(template, values, false)
}

/// Like [`fill_placeholders`], but leaves `{{`/`}}` escaped and escapes the
/// braces of substituted values, so the output can be filled again.
fn fill_partial(template: &str, values: &[(&str, &str)]) -> String {
    fill(template, values, true)
}

fn fill(template: &str, values: &[(&str, &str)], keep_escapes: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(if keep_escapes { &tail[..2] } else { &tail[..1] });
            rest = &tail[2..];
            continue;
        }
        let token = tail
            .strip_prefix('{')
            .and_then(|inner| inner.find('}').map(|close| &inner[..close]));
        match token.and_then(|name| values.iter().find(|(key, _)| *key == name)) {
            Some((key, value)) if keep_escapes => {
                out.push_str(&value.replace('{', "{{").replace('}', "}}"));
                rest = &tail[key.len() + 2..];
            }
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 2..];
            }
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders announcements into post text for one target.
#[derive(Debug, Clone)]
pub struct StatusComposer {
    template: String,
    page_url: String,
}

impl StatusComposer {
    /// `template` may contain literal `\n` sequences; they become newlines.
    pub fn new(template: &str, page_url: impl Into<String>) -> Self {
        Self {
            template: template.replace(r"\n", "\n"),
            page_url: page_url.into(),
        }
    }

    /// Render the post text for `announcement`.
    ///
    /// The date renders as `YYYY/MM/DD` and literal `\n` in the header as a
    /// newline. Newlines are removed from the body before it is cut to the
    /// budget from [`max_body_len`]; the ellipsis is always appended.
    ///
    /// # Returns
    ///
    /// The finished status. Its length is not re-checked.
    pub fn compose(&self, announcement: &Announcement) -> String {
        let date = announcement.date.format("%Y/%m/%d").to_string();
        let header = announcement.header.replace(r"\n", "\n");
        let status = fill_partial(
            &self.template,
            &[("date", date.as_str()), ("header", header.as_str())],
        );

        let fixed_len = fill_placeholders(&status, &[]).chars().count();
        let budget = max_body_len(fixed_len);
        let flat_body = announcement.body.replace('\n', "");
        let mut body = char_prefix(&flat_body, budget).to_string();
        body.push(ELLIPSIS);
        debug!(id = %announcement.id, budget, "Computed body budget");

        fill_placeholders(&status, &[("body", body.as_str()), ("url", self.page_url.as_str())])
    }
}
