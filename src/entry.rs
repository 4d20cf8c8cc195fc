use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::classify::{Anchor, HeaderDeclaration};
use crate::error::IndexError;
use crate::formats::FlatEntry;

static SERIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(?:-[0-9]+)?").expect("SERIAL_RE: hardcoded regex is valid")
});

/// Extracts one entry from a content anchor.
///
/// Returns `Ok(None)` for anchors that do not carry an ASCII serial number
/// (footer "contents" links and the like). A range that ends before it starts,
/// such as `10-9`, is a `ReversedRange` error.
pub fn extract(
    table: usize,
    anchor: &Anchor,
    parent: Option<&HeaderDeclaration>,
    base: &Url,
) -> Result<Option<FlatEntry>, IndexError> {
    let text = anchor.text.trim();
    let Some(serial) = SERIAL_RE.find(text) else {
        return Ok(None);
    };
    let serial = serial.as_str();

    let unresolved = || IndexError::UnresolvedLink {
        table,
        href: anchor.href.clone().unwrap_or_default(),
        base: base.to_string(),
    };
    let href = anchor.href.as_deref().ok_or_else(unresolved)?;
    let source_url = resolve_href(base, href).map_err(|_| unresolved())?;

    let serial_start = serial.split('-').next().unwrap_or(serial).to_owned();
    let serial_end = serial.split('-').next_back().unwrap_or(serial).to_owned();
    if compare_serials(&serial_start, &serial_end) == Ordering::Greater {
        return Err(IndexError::ReversedRange {
            table,
            text: serial.to_owned(),
        });
    }

    Ok(Some(FlatEntry {
        source_url: source_url.to_string(),
        serial_start,
        serial_end,
        parent_no: parent.map(|p| p.parent_no.clone()),
        parent_title: parent.map(|p| p.parent_title.clone()),
    }))
}

fn resolve_href(base: &Url, href: &str) -> Result<Url, url::ParseError> {
    match Url::parse(href) {
        Ok(url) if url.has_host() => Ok(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href),
        Err(err) => Err(err),
    }
}

/// Numeric comparison of decimal-digit strings of any length.
pub fn compare_serials(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
