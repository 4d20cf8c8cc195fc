use anyhow::Context as _;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};

use crate::fetch::{FetchedPage, PageFetcher};
use crate::formats::{FlatEntry, RenderedContent, Sutra};

/// CSS selectors locating the parts of a leaf page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafSelectors {
    pub title: String,
    pub head: String,
    pub main: String,
    pub secondary: String,
}

impl Default for LeafSelectors {
    fn default() -> Self {
        Self {
            title: "title".to_owned(),
            head: "h1, h2, h3".to_owned(),
            main: "p".to_owned(),
            secondary: ".pali, [lang|=\"pi\"]".to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct LeafParser {
    title: Selector,
    head: Selector,
    main: Selector,
    secondary: Selector,
}

impl LeafParser {
    pub fn new(selectors: &LeafSelectors) -> anyhow::Result<Self> {
        Ok(Self {
            title: compile(&selectors.title).context("title selector")?,
            head: compile(&selectors.head).context("head selector")?,
            main: compile(&selectors.main).context("main selector")?,
            secondary: compile(&selectors.secondary).context("secondary selector")?,
        })
    }

    pub fn parse(&self, page: &FetchedPage) -> RenderedContent {
        let document = Html::parse_document(&page.html);

        let title = document
            .select(&self.title)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default();

        let secondary_lines = document
            .select(&self.secondary)
            .filter(|el| !self.has_secondary_ancestor(*el))
            .flat_map(text_lines)
            .collect::<Vec<_>>();

        let head_lines = document
            .select(&self.head)
            .filter(|el| !self.has_secondary_ancestor(*el) && !self.secondary.matches(el))
            .flat_map(text_lines)
            .collect();

        let main_lines = document
            .select(&self.main)
            .filter(|el| !self.has_secondary_ancestor(*el) && !self.secondary.matches(el))
            .flat_map(text_lines)
            .collect();

        RenderedContent {
            title,
            head_lines,
            main_lines,
            secondary_text: secondary_lines.join("\n"),
            last_modified: page.modified_or_retrieved(),
        }
    }

    fn has_secondary_ancestor(&self, element: ElementRef<'_>) -> bool {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| self.secondary.matches(&ancestor))
    }
}

fn compile(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow::anyhow!("parse selector {selector:?}: {err}"))
}

const LINE_BREAKING: &[&str] = &["br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4"];

fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if LINE_BREAKING.contains(&el.name()) => text.push('\n'),
            _ => {}
        }
    }
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fetches the page behind one index entry and attaches its text.
pub fn fetch_sutra(
    fetcher: &dyn PageFetcher,
    parser: &LeafParser,
    entry: FlatEntry,
) -> anyhow::Result<Sutra> {
    let url = url::Url::parse(&entry.source_url)
        .with_context(|| format!("parse source url: {}", entry.source_url))?;
    let page = fetcher
        .fetch(&url)
        .with_context(|| format!("fetch leaf page: {url}"))?;
    let mut content = parser.parse(&page);
    if content.title.is_empty() {
        content.title = entry.serial_label();
    }
    tracing::debug!(
        %url,
        serial = %entry.serial_label(),
        main_lines = content.main_lines.len(),
        "leaf fetched"
    );
    Ok(Sutra::from_entry(entry, content))
}
