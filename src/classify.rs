use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::error::IndexError;

// 1.諸天相應(請點選經號進入)：
// 9集(請點選經號進入)：
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)\.?(\S+)\(請點選經號進入\)：$").expect("HEADER_RE: hardcoded regex is valid")
});

/// An `<a>` element reduced to what the index parser looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: Option<String>,
    pub text: String,
}

impl Anchor {
    pub fn new(href: Option<&str>, text: &str) -> Self {
        Self {
            href: href.map(str::to_owned),
            text: text.to_owned(),
        }
    }

    pub fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            href: element.value().attr("href").map(str::to_owned),
            text: element.text().collect::<String>(),
        }
    }

    /// Same-page fragment links and bare named anchors point nowhere outside the index.
    pub fn is_fragment_only(&self) -> bool {
        match self.href.as_deref() {
            Some(href) => href.starts_with('#'),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDeclaration {
    pub parent_no: String,
    pub parent_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowClass<'a> {
    Header(HeaderDeclaration),
    Skip,
    Content(&'a [Anchor]),
}

pub fn classify(table: usize, anchors: &[Anchor]) -> Result<RowClass<'_>, IndexError> {
    match anchors {
        [] => Ok(RowClass::Skip),
        [only] => parse_header(&only.text)
            .map(RowClass::Header)
            .ok_or_else(|| IndexError::MalformedHeader {
                table,
                text: only.text.clone(),
            }),
        many if many.iter().all(Anchor::is_fragment_only) => Ok(RowClass::Skip),
        many => Ok(RowClass::Content(many)),
    }
}

fn parse_header(text: &str) -> Option<HeaderDeclaration> {
    let caps = HEADER_RE.captures(text.trim())?;
    Some(HeaderDeclaration {
        parent_no: caps[1].to_owned(),
        parent_title: caps[2].to_owned(),
    })
}
