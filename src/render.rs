use chrono::{DateTime, Utc};

use crate::project::PageRecord;

pub const STYLESHEET_PATH: &str = "style.css";
pub const SCRIPT_PATH: &str = "Scripts/a.js";
pub const INTRODUCTION_PATH: &str = "introduction.xhtml";
pub const INTRODUCTION_TITLE: &str = "說明";

/// Renders one scripture page.
pub fn sutra_page(record: &PageRecord, lang: &str) -> String {
    let page_dir = parent_dir(&record.output_path);
    let stylesheet = relative_path(STYLESHEET_PATH, page_dir);
    let script = relative_path(SCRIPT_PATH, page_dir);

    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", xml_escape(&record.title)));
    push_section(&mut body, "head", record.head_lines.iter().map(String::as_str));
    push_section(&mut body, "main", record.main_lines.iter().map(String::as_str));
    if !record.secondary_text.trim().is_empty() {
        push_section_lang(
            &mut body,
            "pali",
            Some("pi"),
            record.secondary_text.trim().lines(),
        );
    }

    wrap_xhtml_document(&record.head_title, lang, &stylesheet, Some(&script), &body)
}

/// Renders the page describing where the texts came from and when they were
/// last changed.
pub fn introduction_page(
    collection_title: &str,
    homepage: &str,
    lang: &str,
    modified: DateTime<Utc>,
    created: DateTime<Utc>,
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<h1>{}</h1>\n",
        xml_escape(&format!("{collection_title} {INTRODUCTION_TITLE}"))
    ));
    body.push_str(&format!(
        "<p>項目主頁：<a href=\"{href}\">{text}</a></p>\n",
        href = xml_escape(homepage),
        text = xml_escape(homepage)
    ));
    body.push_str(&format!(
        "<p>原始網頁最後修改日期：{}</p>\n",
        modified.format("%Y-%m-%d")
    ));
    body.push_str(&format!(
        "<p>本電子書製作時間：{}</p>\n",
        created.format("%Y-%m-%d %H:%M")
    ));

    wrap_xhtml_document(INTRODUCTION_TITLE, lang, STYLESHEET_PATH, None, &body)
}

fn push_section<'a>(out: &mut String, class: &str, lines: impl Iterator<Item = &'a str>) {
    push_section_lang(out, class, None, lines);
}

fn push_section_lang<'a>(
    out: &mut String,
    class: &str,
    lang: Option<&str>,
    lines: impl Iterator<Item = &'a str>,
) {
    let paragraphs = lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("  <p>{}</p>\n", xml_escape(line.trim())))
        .collect::<String>();
    if paragraphs.is_empty() {
        return;
    }

    match lang {
        Some(lang) => out.push_str(&format!(
            "<div class=\"{}\" lang=\"{lang}\" xml:lang=\"{lang}\">\n",
            xml_escape(class),
            lang = xml_escape(lang)
        )),
        None => out.push_str(&format!("<div class=\"{}\">\n", xml_escape(class))),
    }
    out.push_str(&paragraphs);
    out.push_str("</div>\n");
}

fn wrap_xhtml_document(
    title: &str,
    lang: &str,
    stylesheet: &str,
    script: Option<&str>,
    body_html: &str,
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{}\" xml:lang=\"{}\">\n",
        xml_escape(lang),
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str(&format!(
        "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\" />\n",
        xml_escape(stylesheet)
    ));
    if let Some(script) = script {
        out.push_str(&format!(
            "  <script type=\"text/javascript\" src=\"{}\"></script>\n",
            xml_escape(script)
        ));
    }
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_html);
    if !body_html.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

/// Path of `target` as seen from a document in directory `from_dir`, both
/// relative to the publication root.
pub fn relative_path(target: &str, from_dir: &str) -> String {
    let target_parts = target.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
    let from_parts = from_dir.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();

    let common = target_parts
        .iter()
        .zip(from_parts.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(target_parts.len().saturating_sub(1));

    let mut parts = vec![".."; from_parts.len() - common];
    parts.extend_from_slice(&target_parts[common..]);
    parts.join("/")
}

pub fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
