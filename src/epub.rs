use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;

use crate::project::NavPoint;
use crate::render::{SCRIPT_PATH, STYLESHEET_PATH, xml_escape};

/// Everything that goes into one publication.
#[derive(Debug, Clone)]
pub struct PublicationManifest {
    pub entries: Vec<ManifestEntry>,
    pub nav: Vec<NavPoint>,
    pub latest_modified: DateTime<Utc>,
}

/// One document of the publication; `path` is relative to the content root.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub path: String,
    pub nav_title: String,
    pub bytes: Vec<u8>,
    /// The document links the bundled script.
    pub scripted: bool,
}

#[derive(Debug, Clone)]
pub struct BookMetadata {
    pub title: String,
    /// BCP-47 tags; the first one is the language of the pages.
    pub languages: Vec<String>,
    pub created: DateTime<Utc>,
}

impl BookMetadata {
    pub fn primary_language(&self) -> &str {
        self.languages
            .first()
            .map(String::as_str)
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or("und")
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteEpubOptions {
    pub force: bool,
}

pub fn write_epub(
    manifest: &PublicationManifest,
    metadata: &BookMetadata,
    out_path: &Path,
    options: &WriteEpubOptions,
) -> anyhow::Result<()> {
    if manifest.entries.is_empty() {
        anyhow::bail!("publication has no pages: {}", metadata.title);
    }
    if out_path.exists() && !options.force {
        anyhow::bail!("epub output already exists: {}", out_path.display());
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create epub parent dir: {}", parent.display()))?;
    }

    let uuid = uuid::Uuid::new_v4();
    let lang = metadata.primary_language();

    let container_xml = render_container_xml();
    let css = default_style_css();
    let script = default_script();
    let nav_xhtml = render_nav_xhtml(&metadata.title, lang, &manifest.nav);
    let toc_ncx = render_toc_ncx(&metadata.title, uuid, &manifest.nav);
    let content_opf = render_content_opf(metadata, uuid, manifest);

    let mut out_options = OpenOptions::new();
    out_options.write(true);
    if options.force {
        out_options.create(true).truncate(true);
    } else {
        out_options.create_new(true);
    }
    let out_file = out_options
        .open(out_path)
        .with_context(|| format!("open epub output: {}", out_path.display()))?;

    let mut zip = zip::ZipWriter::new(out_file);

    // `mimetype` must be the first entry and must be stored uncompressed.
    let mimetype_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", mimetype_options)
        .context("epub start_file mimetype")?;
    zip.write_all(b"application/epub+zip")
        .context("epub write mimetype")?;

    let deflated_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let fixed = [
        ("META-INF/container.xml".to_owned(), container_xml),
        ("OEBPS/content.opf".to_owned(), content_opf),
        ("OEBPS/nav.xhtml".to_owned(), nav_xhtml),
        ("OEBPS/toc.ncx".to_owned(), toc_ncx),
        (format!("OEBPS/{STYLESHEET_PATH}"), css),
        (format!("OEBPS/{SCRIPT_PATH}"), script),
    ];
    for (name, contents) in &fixed {
        zip.start_file(name.as_str(), deflated_options)
            .with_context(|| format!("epub start_file {name}"))?;
        zip.write_all(contents.as_bytes())
            .with_context(|| format!("epub write {name}"))?;
    }

    for entry in &manifest.entries {
        zip.start_file(format!("OEBPS/{}", entry.path), deflated_options)
            .with_context(|| format!("epub start_file page: {}", entry.path))?;
        zip.write_all(&entry.bytes)
            .with_context(|| format!("epub write page: {}", entry.path))?;
    }

    zip.finish().context("epub finish zip")?;
    tracing::info!(
        out = %out_path.display(),
        pages = manifest.entries.len(),
        "epub written"
    );
    Ok(())
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn default_style_css() -> String {
    r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1.2em; line-height: 1.6; }
h1 { font-size: 1.4em; }
.head p { font-weight: bold; }
.pali { margin-top: 2em; padding-top: 1em; border-top: 1px solid #ccc; color: #333; }
"#
    .to_string()
}

// Tapping a page heading shows or hides its Pali block.
fn default_script() -> String {
    r#"document.addEventListener("DOMContentLoaded", function () {
  var heading = document.querySelector("h1");
  if (!heading) {
    return;
  }
  heading.addEventListener("click", function () {
    var blocks = document.querySelectorAll(".pali");
    for (var i = 0; i < blocks.length; i++) {
      blocks[i].style.display = blocks[i].style.display === "none" ? "" : "none";
    }
  });
});
"#
    .to_string()
}

fn render_nav_xhtml(title: &str, lang: &str, nav: &[NavPoint]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_PATH}\" />\n"
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(title)));
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    push_nav_list(&mut out, nav, 2);
    out.push_str("  </nav>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn push_nav_list(out: &mut String, points: &[NavPoint], depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}<ol>\n"));
    for point in points {
        match point {
            NavPoint::Page { title, path } => out.push_str(&format!(
                "{indent}  <li><a href=\"{}\">{}</a></li>\n",
                xml_escape(path),
                xml_escape(title)
            )),
            NavPoint::Section { title, children } => {
                out.push_str(&format!(
                    "{indent}  <li><span>{}</span>\n",
                    xml_escape(title)
                ));
                push_nav_list(out, children, depth + 2);
                out.push_str(&format!("{indent}  </li>\n"));
            }
        }
    }
    out.push_str(&format!("{indent}</ol>\n"));
}

fn render_toc_ncx(title: &str, uuid: uuid::Uuid, nav: &[NavPoint]) -> String {
    let mut points = String::new();
    let mut play_order = 0;
    push_nav_points(&mut points, nav, 2, &mut play_order);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"urn:uuid:{}\" />\n",
        xml_escape(&uuid.to_string())
    ));
    out.push_str(&format!(
        "    <meta name=\"dtb:depth\" content=\"{}\" />\n",
        nav_depth(nav)
    ));
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str("  <docTitle><text>");
    out.push_str(&xml_escape(title));
    out.push_str("</text></docTitle>\n");
    out.push_str("  <navMap>\n");
    out.push_str(&points);
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn push_nav_points(out: &mut String, points: &[NavPoint], depth: usize, play_order: &mut usize) {
    let indent = "  ".repeat(depth);
    for point in points {
        // Sections point at their first page; NCX has no target-less entries.
        let Some(src) = point.first_path() else {
            continue;
        };
        *play_order += 1;
        out.push_str(&format!(
            "{indent}<navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n",
            play = *play_order
        ));
        out.push_str(&format!(
            "{indent}  <navLabel><text>{}</text></navLabel>\n",
            xml_escape(point.title())
        ));
        out.push_str(&format!("{indent}  <content src=\"{}\" />\n", xml_escape(src)));
        if let NavPoint::Section { children, .. } = point {
            push_nav_points(out, children, depth + 1, play_order);
        }
        out.push_str(&format!("{indent}</navPoint>\n"));
    }
}

fn nav_depth(points: &[NavPoint]) -> usize {
    points
        .iter()
        .map(|point| match point {
            NavPoint::Page { .. } => 1,
            NavPoint::Section { children, .. } => 1 + nav_depth(children),
        })
        .max()
        .unwrap_or(0)
}

fn render_content_opf(
    metadata: &BookMetadata,
    uuid: uuid::Uuid,
    manifest: &PublicationManifest,
) -> String {
    let lang = metadata.primary_language();
    let modified = metadata
        .created
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let date = manifest
        .latest_modified
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">urn:uuid:{}</dc:identifier>\n",
        xml_escape(&uuid.to_string())
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&metadata.title)
    ));
    for language in &metadata.languages {
        out.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            xml_escape(language)
        ));
    }
    if metadata.languages.is_empty() {
        out.push_str("    <dc:language>und</dc:language>\n");
    }
    out.push_str(&format!("    <dc:date>{}</dc:date>\n", xml_escape(&date)));
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(&modified)
    ));
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    out.push_str(&format!(
        "    <item id=\"css\" href=\"{STYLESHEET_PATH}\" media-type=\"text/css\" />\n"
    ));
    out.push_str(&format!(
        "    <item id=\"js\" href=\"{SCRIPT_PATH}\" media-type=\"{}\" />\n",
        media_type_for_path(SCRIPT_PATH)
    ));
    for (idx, entry) in manifest.entries.iter().enumerate() {
        let properties = if entry.scripted {
            " properties=\"scripted\""
        } else {
            ""
        };
        out.push_str(&format!(
            "    <item id=\"item-{}\" href=\"{}\" media-type=\"{}\"{properties} />\n",
            idx + 1,
            xml_escape(&entry.path),
            media_type_for_path(&entry.path)
        ));
    }
    out.push_str("  </manifest>\n");
    out.push_str("  <spine toc=\"ncx\">\n");
    for (idx, entry) in manifest.entries.iter().enumerate() {
        if media_type_for_path(&entry.path) != "application/xhtml+xml" {
            continue;
        }
        out.push_str(&format!("    <itemref idref=\"item-{}\" />\n", idx + 1));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn media_type_for_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "xhtml" | "html" => "application/xhtml+xml",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
