use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use url::Url;

use crate::catalog::Catalog;
use crate::cli::{BookArgs, BuildArgs, IndexArgs, SourceArgs, TreeArgs};
use crate::content::{LeafParser, LeafSelectors};
use crate::epub::{BookMetadata, ManifestEntry, PublicationManifest, WriteEpubOptions};
use crate::error::IndexError;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::project::{NavPoint, PathStyle, ProjectOptions};
use crate::render::{INTRODUCTION_PATH, INTRODUCTION_TITLE};
use crate::toc::IndexOptions;

/// One collection to turn into a publication.
#[derive(Debug, Clone)]
pub struct CollectionJob<'a> {
    pub index_url: Url,
    pub title: &'a str,
    pub prefix: &'a str,
    pub path_style: PathStyle,
    pub languages: &'a [String],
    pub homepage: &'a str,
    pub selectors: &'a LeafSelectors,
    pub index: IndexOptions,
}

/// Runs index parsing, tree assembly, leaf fetching, projection and rendering
/// for one collection.
pub fn assemble_publication(
    fetcher: &dyn PageFetcher,
    job: &CollectionJob<'_>,
    created: DateTime<Utc>,
) -> anyhow::Result<PublicationManifest> {
    let url = &job.index_url;

    tracing::info!(%url, collection = job.title, "build: index");
    let entries = crate::toc::fetch_flat_index(fetcher, url, &job.index)?;
    if entries.is_empty() {
        return Err(IndexError::NoContent {
            collection: job.title.to_owned(),
        })
        .with_context(|| format!("index page: {url}"));
    }

    tracing::info!(entries = entries.len(), "build: tree");
    let tree = crate::tree::assemble(job.title, entries);

    tracing::info!("build: fetch leaves");
    let parser = LeafParser::new(job.selectors).context("compile leaf selectors")?;
    let tree = tree.try_map_leaves(&mut |entry| {
        crate::content::fetch_sutra(fetcher, &parser, entry)
    })?;

    tracing::info!("build: project");
    let projection = crate::project::project(
        &tree,
        &ProjectOptions {
            prefix: job.prefix.to_owned(),
            path_style: job.path_style,
        },
    )
    .with_context(|| format!("project collection: {url}"))?;

    tracing::info!(pages = projection.pages.len(), "build: render");
    let lang = job
        .languages
        .first()
        .map(String::as_str)
        .unwrap_or("und");

    let introduction = crate::render::introduction_page(
        job.title,
        job.homepage,
        lang,
        projection.latest_modified,
        created,
    );
    let mut entries = vec![ManifestEntry {
        path: INTRODUCTION_PATH.to_owned(),
        nav_title: INTRODUCTION_TITLE.to_owned(),
        bytes: introduction.into_bytes(),
        scripted: false,
    }];
    for page in &projection.pages {
        entries.push(ManifestEntry {
            path: page.path.clone(),
            nav_title: page.nav_title.clone(),
            bytes: crate::render::sutra_page(&page.record, lang).into_bytes(),
            scripted: true,
        });
    }

    let mut nav = vec![NavPoint::Page {
        title: INTRODUCTION_TITLE.to_owned(),
        path: INTRODUCTION_PATH.to_owned(),
    }];
    nav.extend(projection.nav);

    Ok(PublicationManifest {
        entries,
        nav,
        latest_modified: projection.latest_modified,
    })
}

pub fn index(args: IndexArgs) -> anyhow::Result<()> {
    let url = parse_http_url(&args.url).context("parse --url")?;
    let fetcher = fetcher(&args.source)?;
    let entries = crate::toc::fetch_flat_index(&fetcher, &url, &index_options(&args.source))?;

    let mut out = open_output(args.out.as_deref())?;
    for entry in &entries {
        serde_json::to_writer(&mut out, entry).context("serialize index entry")?;
        out.write_all(b"\n").context("write index newline")?;
    }
    out.flush().context("flush index")?;
    Ok(())
}

pub fn tree(args: TreeArgs) -> anyhow::Result<()> {
    let url = parse_http_url(&args.url).context("parse --url")?;
    let fetcher = fetcher(&args.source)?;
    let entries = crate::toc::fetch_flat_index(&fetcher, &url, &index_options(&args.source))?;
    let tree = crate::tree::assemble(&args.title, entries);

    let yaml = serde_yaml::to_string(&tree).context("serialize tree yaml")?;
    let mut out = open_output(args.out.as_deref())?;
    out.write_all(yaml.as_bytes()).context("write tree")?;
    out.flush().context("flush tree")?;
    Ok(())
}

pub fn book(args: BookArgs) -> anyhow::Result<()> {
    let url = parse_http_url(&args.url).context("parse --url")?;
    let out_path = PathBuf::from(&args.out);
    if out_path.exists() && !args.force {
        anyhow::bail!("epub output already exists: {}", out_path.display());
    }

    let fetcher = fetcher(&args.source)?;
    let selectors = LeafSelectors::default();
    let job = CollectionJob {
        index_url: url,
        title: &args.title,
        prefix: &args.prefix,
        path_style: args.path_style,
        languages: &args.languages,
        homepage: &args.homepage,
        selectors: &selectors,
        index: index_options(&args.source),
    };
    write_collection(&fetcher, &job, &out_path, args.force)
}

pub fn run(args: BuildArgs) -> anyhow::Result<()> {
    let base_url = parse_http_url(&args.base_url).context("parse --base-url")?;
    let catalog = match args.catalog.as_deref() {
        Some(path) => Catalog::load(Path::new(path))?,
        None => Catalog::default(),
    };
    let collections = catalog.select(&args.only)?;

    let out_dir = PathBuf::from(&args.out);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;

    // Refuse before fetching anything so a rerun without --force fails fast.
    if !args.force {
        for collection in &collections {
            let out_path = out_dir.join(collection.file_name());
            if out_path.exists() {
                anyhow::bail!("epub output already exists: {}", out_path.display());
            }
        }
    }

    let fetcher = fetcher(&args.source)?;
    for collection in collections {
        let job = CollectionJob {
            index_url: collection.index_url(&base_url)?,
            title: &collection.title,
            prefix: &collection.key,
            path_style: catalog.path_style,
            languages: &catalog.languages,
            homepage: &catalog.homepage,
            selectors: &catalog.selectors,
            index: index_options(&args.source),
        };
        let out_path = out_dir.join(collection.file_name());
        write_collection(&fetcher, &job, &out_path, args.force)
            .with_context(|| format!("build collection {}", collection.key))?;
    }

    Ok(())
}

fn write_collection(
    fetcher: &dyn PageFetcher,
    job: &CollectionJob<'_>,
    out_path: &Path,
    force: bool,
) -> anyhow::Result<()> {
    let created = Utc::now();
    let manifest = assemble_publication(fetcher, job, created)?;

    tracing::info!(out = %out_path.display(), "build: package");
    crate::epub::write_epub(
        &manifest,
        &BookMetadata {
            title: job.title.to_owned(),
            languages: job.languages.to_vec(),
            created,
        },
        out_path,
        &WriteEpubOptions { force },
    )
    .context("write epub")
}

fn fetcher(source: &SourceArgs) -> anyhow::Result<HttpFetcher> {
    HttpFetcher::new(Duration::from_secs(source.timeout_secs.max(1)))
}

fn index_options(source: &SourceArgs) -> IndexOptions {
    IndexOptions {
        chrome_tables: source.chrome_tables,
        lenient_links: source.lenient_links,
        limit: source.limit,
    }
}

fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    Ok(url)
}

fn open_output(path: Option<&str>) -> anyhow::Result<Box<dyn std::io::Write>> {
    let Some(path) = path else {
        return Ok(Box::new(std::io::stdout().lock()));
    };
    let path = Path::new(path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create output: {}", path.display()))?;
    Ok(Box::new(std::io::BufWriter::new(file)))
}
