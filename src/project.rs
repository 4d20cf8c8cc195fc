use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::formats::Sutra;
use crate::tree::{Group, TreeNode};

/// Directory inside the publication holding one page per leaf.
pub const PAGES_DIR: &str = "Pages";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PathStyle {
    /// `Pages/{prefix}{index:04}.xhtml`, numbered in reading order.
    #[default]
    Sequential,
    /// `Pages/{prefix}.{group}.{serial_start}.xhtml`.
    Serial,
}

#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub prefix: String,
    pub path_style: PathStyle,
}

/// Inputs of the page renderer for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub head_title: String,
    pub title: String,
    pub head_lines: Vec<String>,
    pub main_lines: Vec<String>,
    pub secondary_text: String,
    pub output_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedPage {
    pub path: String,
    pub nav_title: String,
    pub record: PageRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavPoint {
    Section {
        title: String,
        children: Vec<NavPoint>,
    },
    Page {
        title: String,
        path: String,
    },
}

impl NavPoint {
    /// Target of the entry: the page itself, or the first page below a section.
    pub fn first_path(&self) -> Option<&str> {
        match self {
            NavPoint::Page { path, .. } => Some(path.as_str()),
            NavPoint::Section { children, .. } => children.iter().find_map(NavPoint::first_path),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NavPoint::Section { title, .. } | NavPoint::Page { title, .. } => title.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub pages: Vec<ProjectedPage>,
    pub nav: Vec<NavPoint>,
    pub latest_modified: DateTime<Utc>,
}

/// Walks the tree in pre-order, assigning each leaf an output path and
/// building the navigation tree. Groups that end up without pages are left out
/// of the navigation.
pub fn project(root: &Group<Sutra>, options: &ProjectOptions) -> Result<Projection, IndexError> {
    let mut walker = Walker {
        options,
        pages: Vec::new(),
        seen_paths: HashSet::new(),
        leaf_groups: 0,
        latest_modified: None,
    };
    let nav = walker.walk(&root.children)?;

    let Some(latest_modified) = walker.latest_modified else {
        return Err(IndexError::NoContent {
            collection: root.title.clone(),
        });
    };

    tracing::debug!(
        collection = %root.title,
        pages = walker.pages.len(),
        %latest_modified,
        "projected"
    );

    Ok(Projection {
        pages: walker.pages,
        nav,
        latest_modified,
    })
}

struct Walker<'a> {
    options: &'a ProjectOptions,
    pages: Vec<ProjectedPage>,
    seen_paths: HashSet<String>,
    leaf_groups: usize,
    latest_modified: Option<DateTime<Utc>>,
}

impl Walker<'_> {
    fn walk(&mut self, nodes: &[TreeNode<Sutra>]) -> Result<Vec<NavPoint>, IndexError> {
        let group_ordinal = if nodes.iter().any(|n| matches!(n, TreeNode::Leaf(_))) {
            self.leaf_groups += 1;
            self.leaf_groups
        } else {
            0
        };

        let mut nav = Vec::new();
        for node in nodes {
            match node {
                TreeNode::Group(group) => {
                    let children = self.walk(&group.children)?;
                    if children.is_empty() {
                        tracing::debug!(title = %group.title, "empty group omitted from navigation");
                        continue;
                    }
                    nav.push(NavPoint::Section {
                        title: group.title.clone(),
                        children,
                    });
                }
                TreeNode::Leaf(sutra) => {
                    let page = self.leaf(sutra, group_ordinal)?;
                    nav.push(NavPoint::Page {
                        title: page.nav_title.clone(),
                        path: page.path.clone(),
                    });
                    self.pages.push(page);
                }
            }
        }
        Ok(nav)
    }

    fn leaf(&mut self, sutra: &Sutra, group_ordinal: usize) -> Result<ProjectedPage, IndexError> {
        let path = match self.options.path_style {
            PathStyle::Sequential => format!(
                "{PAGES_DIR}/{}{:04}.xhtml",
                self.options.prefix,
                self.pages.len() + 1
            ),
            PathStyle::Serial => format!(
                "{PAGES_DIR}/{}.{group_ordinal}.{}.xhtml",
                self.options.prefix, sutra.serial_start
            ),
        };
        if !self.seen_paths.insert(path.clone()) {
            return Err(IndexError::DuplicatePath { path });
        }

        let modified = sutra.content.last_modified;
        self.latest_modified = Some(match self.latest_modified {
            Some(latest) if latest >= modified => latest,
            _ => modified,
        });

        let content = &sutra.content;
        Ok(ProjectedPage {
            nav_title: sutra.serial_label(),
            record: PageRecord {
                head_title: sutra.serial_start.clone(),
                title: content.title.clone(),
                head_lines: content.head_lines.clone(),
                main_lines: content.main_lines.clone(),
                secondary_text: content.secondary_text.clone(),
                output_path: path.clone(),
            },
            path,
        })
    }
}
