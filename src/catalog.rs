use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::content::LeafSelectors;
use crate::project::PathStyle;

pub const DEFAULT_HOMEPAGE: &str = "https://meng89.github.io/nikaya";

/// Collections to publish and the settings they share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_homepage")]
    pub homepage: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub path_style: PathStyle,
    #[serde(default)]
    pub selectors: LeafSelectors,
    pub collections: Vec<Collection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Short name used for `--only` and as the page path prefix.
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_pali: Option<String>,
    /// Index page, relative to the base URL.
    pub index: String,
}

impl Collection {
    pub fn index_url(&self, base: &Url) -> anyhow::Result<Url> {
        base.join(&self.index)
            .with_context(|| format!("join index path {:?} onto {base}", self.index))
    }

    pub fn file_name(&self) -> String {
        format!("{}.epub", self.title)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let collection = |key: &str, title: &str, title_pali: &str, index: &str| Collection {
            key: key.to_owned(),
            title: title.to_owned(),
            title_pali: Some(title_pali.to_owned()),
            index: index.to_owned(),
        };

        Self {
            homepage: default_homepage(),
            languages: default_languages(),
            path_style: PathStyle::default(),
            selectors: LeafSelectors::default(),
            collections: vec![
                collection("sn", "相應部", "Saṃyutta Nikāya", "SN/index.htm"),
                collection("mn", "中部", "Majjhima Nikāya", "MN/index.htm"),
                collection("dn", "長部", "Dīgha Nikāya", "DN/index.htm"),
                collection("an", "增支部", "Aṅguttara Nikāya", "AN/index.htm"),
            ],
        }
    }
}

impl Catalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read catalog: {}", path.display()))?;
        let catalog: Catalog = serde_yaml::from_str(&yaml).context("parse catalog yaml")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.collections.is_empty() {
            anyhow::bail!("catalog lists no collections");
        }
        let mut keys = std::collections::HashSet::new();
        for collection in &self.collections {
            if collection.key.trim().is_empty() {
                anyhow::bail!("catalog collection key is empty: {}", collection.title);
            }
            if collection.title.trim().is_empty() {
                anyhow::bail!("catalog collection title is empty: {}", collection.key);
            }
            if !keys.insert(collection.key.as_str()) {
                anyhow::bail!("duplicate catalog collection key: {}", collection.key);
            }
        }
        Ok(())
    }

    /// Collections named in `only`, in catalog order; all of them when `only` is empty.
    pub fn select(&self, only: &[String]) -> anyhow::Result<Vec<&Collection>> {
        for key in only {
            if !self.collections.iter().any(|c| &c.key == key) {
                anyhow::bail!("unknown collection key: {key}");
            }
        }
        Ok(self
            .collections
            .iter()
            .filter(|c| only.is_empty() || only.contains(&c.key))
            .collect())
    }
}

fn default_homepage() -> String {
    DEFAULT_HOMEPAGE.to_owned()
}

fn default_languages() -> Vec<String> {
    vec!["zh-TW".to_owned(), "pi".to_owned()]
}
