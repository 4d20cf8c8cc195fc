use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One numbered link scraped from an index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatEntry {
    pub source_url: String,
    pub serial_start: String,
    pub serial_end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<String>,
}

impl FlatEntry {
    /// `"9"` for a single text, `"9-10"` for a range.
    pub fn serial_label(&self) -> String {
        if self.serial_start == self.serial_end {
            self.serial_start.clone()
        } else {
            format!("{}-{}", self.serial_start, self.serial_end)
        }
    }
}

/// Text of one leaf page, ready to be handed to the page renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedContent {
    pub title: String,
    pub head_lines: Vec<String>,
    pub main_lines: Vec<String>,
    pub secondary_text: String,
    pub last_modified: DateTime<Utc>,
}

/// A leaf of the populated tree: one scripture unit and its fetched text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sutra {
    pub serial_start: String,
    pub serial_end: String,
    pub source_url: String,
    pub content: RenderedContent,
}

impl Sutra {
    pub fn from_entry(entry: FlatEntry, content: RenderedContent) -> Self {
        Self {
            serial_start: entry.serial_start,
            serial_end: entry.serial_end,
            source_url: entry.source_url,
            content,
        }
    }

    pub fn serial_label(&self) -> String {
        if self.serial_start == self.serial_end {
            self.serial_start.clone()
        } else {
            format!("{}-{}", self.serial_start, self.serial_end)
        }
    }
}
