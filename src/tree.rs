use serde::{Deserialize, Serialize};

use crate::formats::FlatEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode<L> {
    Group(Group<L>),
    Leaf(L),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group<L> {
    pub title: String,
    pub children: Vec<TreeNode<L>>,
}

impl<L> Group<L> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Leaves in pre-order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        collect_leaves(&self.children, &mut out);
        out
    }

    /// Rebuilds the tree with every leaf replaced by `f(leaf)`, keeping the shape.
    pub fn try_map_leaves<M, E>(
        self,
        f: &mut impl FnMut(L) -> Result<M, E>,
    ) -> Result<Group<M>, E> {
        let mut children = Vec::with_capacity(self.children.len());
        for child in self.children {
            children.push(match child {
                TreeNode::Group(group) => TreeNode::Group(group.try_map_leaves(&mut *f)?),
                TreeNode::Leaf(leaf) => TreeNode::Leaf(f(leaf)?),
            });
        }
        Ok(Group {
            title: self.title,
            children,
        })
    }
}

fn collect_leaves<'a, L>(nodes: &'a [TreeNode<L>], out: &mut Vec<&'a L>) {
    for node in nodes {
        match node {
            TreeNode::Group(group) => collect_leaves(&group.children, out),
            TreeNode::Leaf(leaf) => out.push(leaf),
        }
    }
}

/// Groups the flat index into one subgroup per run of entries sharing a parent.
///
/// Runs are maximal and consecutive: a parent that reappears after another
/// parent opens a new group instead of joining the earlier one. Entries with no
/// parent form runs titled with the collection title.
pub fn assemble(collection_title: &str, entries: Vec<FlatEntry>) -> Group<FlatEntry> {
    let mut root = Group::new(collection_title);
    let mut current: Option<(ParentKey, Group<FlatEntry>)> = None;

    for entry in entries {
        let key = ParentKey::of(&entry);
        match current.as_mut() {
            Some((run_key, group)) if *run_key == key => {
                group.children.push(TreeNode::Leaf(entry));
            }
            _ => {
                if let Some((_, group)) = current.take() {
                    root.children.push(TreeNode::Group(group));
                }
                let title = key
                    .title
                    .clone()
                    .unwrap_or_else(|| collection_title.to_owned());
                let mut group = Group::new(title);
                group.children.push(TreeNode::Leaf(entry));
                current = Some((key, group));
            }
        }
    }
    if let Some((_, group)) = current {
        root.children.push(TreeNode::Group(group));
    }

    tracing::debug!(
        collection = collection_title,
        groups = root.children.len(),
        "tree assembled"
    );
    root
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParentKey {
    no: Option<String>,
    title: Option<String>,
}

impl ParentKey {
    fn of(entry: &FlatEntry) -> Self {
        Self {
            no: entry.parent_no.clone(),
            title: entry.parent_title.clone(),
        }
    }
}
