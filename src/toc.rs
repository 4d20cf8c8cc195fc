use std::sync::LazyLock;

use anyhow::Context as _;
use scraper::{Html, Selector};
use url::Url;

use crate::classify::{self, Anchor, HeaderDeclaration, RowClass};
use crate::error::IndexError;
use crate::fetch::PageFetcher;
use crate::formats::FlatEntry;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("TABLE: hardcoded selector is valid"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("ANCHOR: hardcoded selector is valid"));

/// Tables at the top of an index page that hold the site banner and navigation.
pub const DEFAULT_CHROME_TABLES: usize = 3;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub chrome_tables: usize,
    /// Skip anchors whose href cannot be resolved instead of failing the run.
    pub lenient_links: bool,
    /// Stop after this many entries.
    pub limit: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            chrome_tables: DEFAULT_CHROME_TABLES,
            lenient_links: false,
            limit: None,
        }
    }
}

/// Parent declared by the most recent header table, carried from table to table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexState {
    pub parent: Option<HeaderDeclaration>,
}

/// Advances the index over one table.
pub fn step(
    state: IndexState,
    table: usize,
    anchors: &[Anchor],
    base: &Url,
    options: &IndexOptions,
) -> Result<(IndexState, Vec<FlatEntry>), IndexError> {
    match classify::classify(table, anchors)? {
        RowClass::Header(header) => {
            tracing::debug!(
                table,
                parent_no = %header.parent_no,
                parent_title = %header.parent_title,
                "header"
            );
            Ok((
                IndexState {
                    parent: Some(header),
                },
                Vec::new(),
            ))
        }
        RowClass::Skip => Ok((state, Vec::new())),
        RowClass::Content(anchors) => {
            let mut entries = Vec::new();
            for anchor in anchors {
                match crate::entry::extract(table, anchor, state.parent.as_ref(), base) {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(err @ IndexError::UnresolvedLink { .. }) if options.lenient_links => {
                        tracing::warn!(%err, "skipping unresolved link");
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok((state, entries))
        }
    }
}

/// Tables of the document in order, each reduced to its anchors.
pub fn tables_from_html(html: &str) -> Vec<Vec<Anchor>> {
    let document = Html::parse_document(html);
    document
        .select(&TABLE)
        .map(|table| {
            table
                .select(&ANCHOR)
                .map(Anchor::from_element)
                .collect()
        })
        .collect()
}

pub fn flat_index_from_html(
    html: &str,
    base: &Url,
    options: &IndexOptions,
) -> Result<Vec<FlatEntry>, IndexError> {
    let mut state = IndexState::default();
    let mut toc = Vec::new();

    for (table, anchors) in tables_from_html(html)
        .into_iter()
        .enumerate()
        .skip(options.chrome_tables)
    {
        let (next, entries) = step(state, table, &anchors, base, options)?;
        state = next;
        toc.extend(entries);

        if let Some(limit) = options.limit
            && toc.len() >= limit
        {
            toc.truncate(limit);
            tracing::info!(limit, table, "index limit reached");
            break;
        }
    }

    Ok(toc)
}

pub fn fetch_flat_index(
    fetcher: &dyn PageFetcher,
    url: &Url,
    options: &IndexOptions,
) -> anyhow::Result<Vec<FlatEntry>> {
    let page = fetcher
        .fetch(url)
        .with_context(|| format!("fetch index page: {url}"))?;
    let toc = flat_index_from_html(&page.html, &page.url, options)
        .with_context(|| format!("parse index page: {url}"))?;
    tracing::info!(%url, entries = toc.len(), "index parsed");
    Ok(toc)
}
