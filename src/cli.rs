use clap::{Args, Parser, Subcommand};

use crate::project::PathStyle;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the flat entry index of one index page as JSON Lines.
    Index(IndexArgs),
    /// Print the assembled tree of one index page as YAML.
    Tree(TreeArgs),
    /// Build the EPUB of one collection.
    Book(BookArgs),
    /// Build the EPUB of every collection in the catalog.
    Build(BuildArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Tables at the top of the index page to ignore (banner and navigation).
    #[arg(long, default_value_t = crate::toc::DEFAULT_CHROME_TABLES)]
    pub chrome_tables: usize,

    /// Skip links that cannot be resolved instead of failing.
    #[arg(long)]
    pub lenient_links: bool,

    /// Keep only the first N entries of each index.
    #[arg(long)]
    pub limit: Option<usize>,

    /// HTTP request timeout.
    #[arg(long, default_value_t = crate::fetch::DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Index page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Output file for the JSON Lines index (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Index page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Collection title used for the root and for entries without a parent.
    #[arg(long)]
    pub title: String,

    /// Output file for the YAML tree (default: stdout).
    #[arg(long)]
    pub out: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct BookArgs {
    /// Index page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Book title.
    #[arg(long)]
    pub title: String,

    /// Output path of the `.epub` file.
    #[arg(long)]
    pub out: String,

    /// Prefix of page file names.
    #[arg(long, default_value = "page")]
    pub prefix: String,

    #[arg(long, value_enum, default_value_t = PathStyle::Sequential)]
    pub path_style: PathStyle,

    /// Language tags written to the book metadata; the first applies to pages.
    #[arg(long = "lang", default_values = ["zh-TW", "pi"])]
    pub languages: Vec<String>,

    /// Homepage shown on the introduction page.
    #[arg(long, default_value = crate::catalog::DEFAULT_HOMEPAGE)]
    pub homepage: String,

    /// Overwrite an existing output file.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Base URL that catalog index paths are resolved against.
    #[arg(long)]
    pub base_url: String,

    /// Output directory for the `.epub` files.
    #[arg(long)]
    pub out: String,

    /// Catalog YAML (default: the four Nikāyas).
    #[arg(long)]
    pub catalog: Option<String>,

    /// Build only these collection keys.
    #[arg(long)]
    pub only: Vec<String>,

    /// Overwrite existing output files.
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}
