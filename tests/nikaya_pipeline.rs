use std::fs;
use std::io::Read as _;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use nikayabook::formats::FlatEntry;
use nikayabook::tree::{Group, TreeNode};
use predicates::prelude::*;

const CHROME: &str = r#"<table><tr><td><img src="banner.gif" /></td></tr></table>
<table><tr><td><a href="../index.htm">首頁</a> <a href="../MN/index.htm">中部</a></td></tr></table>
<table><tr><td>選擇經號</td></tr></table>"#;

fn sn_index() -> String {
    format!(
        r##"<!doctype html>
<html>
  <head><title>相應部</title></head>
  <body>
{CHROME}
<table><tr><td><a name="1">1.諸天相應(請點選經號進入)：</a></td></tr></table>
<table><tr><td><a href="SN0001.htm">1</a> <a href="SN0002.htm">2-3</a> <a href="#top">top</a></td></tr></table>
<table><tr><td><a href="#1">1</a> <a href="#2">2</a></td></tr></table>
<table><tr><td><a name="2">2.天子相應(請點選經號進入)：</a></td></tr></table>
<table><tr><td><a href="/SN/SN0004.htm">4</a> <a href="#top">top</a></td></tr></table>
  </body>
</html>
"##
    )
}

fn leaf(title: &str, main: &str, pali: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head><title>{title}</title></head>
  <body>
    <h2>相應部/{title}</h2>
    <p>{main}</p>
    <div class="pali"><p>{pali}</p></div>
  </body>
</html>
"#
    )
}

fn spawn_nikaya_server() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let (status, body, last_modified) = match request.url() {
                "/SN/index.htm" => (200, sn_index(), None),
                "/SN/SN0001.htm" => (
                    200,
                    leaf("暴流經", "我聽到這樣：", "Evaṃ me sutaṃ."),
                    Some("Sun, 01 May 2016 12:00:00 GMT"),
                ),
                "/SN/SN0002.htm" => (
                    200,
                    leaf("解脫經", "有一次，世尊住在舍衛城。", "Ekaṃ samayaṃ bhagavā"),
                    Some("Tue, 03 Jan 2017 08:30:00 GMT"),
                ),
                "/SN/SN0004.htm" => (
                    200,
                    leaf("迦葉經", "那時，天子迦葉。", "Atha kho kassapo"),
                    Some("Mon, 02 Jan 2017 00:00:00 GMT"),
                ),
                "/MN/index.htm" => (
                    200,
                    format!("<!doctype html><html><body>{CHROME}</body></html>"),
                    None,
                ),
                "/AN/index.htm" => (
                    200,
                    format!(
                        "<!doctype html><html><body>{CHROME}\
                         <table><tr><td><a href=\"AN0404.htm\">1</a> <a href=\"#top\">top</a></td></tr></table>\
                         </body></html>"
                    ),
                    None,
                ),
                _ => (404, "not found".to_owned(), None),
            };

            let mut response = tiny_http::Response::from_string(body).with_status_code(status);
            if status == 200 {
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"text/html; charset=utf-8"[..],
                )
                .expect("build header");
                response = response.with_header(header);
            }
            if let Some(value) = last_modified {
                let header =
                    tiny_http::Header::from_bytes(&b"Last-Modified"[..], value.as_bytes())
                        .expect("build header");
                response = response.with_header(header);
            }

            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

fn read_zip_entry(path: &Path, name: &str) -> anyhow::Result<String> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(name)?;
    let mut out = String::new();
    entry.read_to_string(&mut out)?;
    Ok(out)
}

fn zip_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file)?;
    Ok(archive.file_names().map(str::to_owned).collect())
}

#[test]
fn index_prints_flat_entries_as_jsonl() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    let output = cmd
        .args(["index", "--url", &format!("{base_url}/SN/index.htm")])
        .output()?;
    assert!(output.status.success(), "index failed: {output:?}");

    let entries = String::from_utf8(output.stdout)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<FlatEntry>)
        .collect::<Result<Vec<_>, _>>()?;

    let serials = entries
        .iter()
        .map(|e| (e.serial_start.as_str(), e.serial_end.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(serials, vec![("1", "1"), ("2", "3"), ("4", "4")]);
    assert_eq!(entries[0].source_url, format!("{base_url}/SN/SN0001.htm"));
    assert_eq!(entries[2].source_url, format!("{base_url}/SN/SN0004.htm"));
    assert_eq!(entries[1].parent_title.as_deref(), Some("諸天相應"));
    assert_eq!(entries[2].parent_no.as_deref(), Some("2"));

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn tree_groups_entries_by_header() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();
    let temp = tempfile::TempDir::new()?;
    let tree_path = temp.path().join("out").join("tree.yaml");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "tree",
        "--url",
        &format!("{base_url}/SN/index.htm"),
        "--title",
        "相應部",
        "--out",
        tree_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let tree: Group<FlatEntry> = serde_yaml::from_str(&fs::read_to_string(&tree_path)?)?;
    assert_eq!(tree.title, "相應部");
    let titles = tree
        .children
        .iter()
        .map(|node| match node {
            TreeNode::Group(group) => group.title.as_str(),
            TreeNode::Leaf(_) => "<leaf>",
        })
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["諸天相應", "天子相應"]);
    assert_eq!(tree.leaves().len(), 3);

    // Refuses to clobber an existing output.
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "tree",
        "--url",
        &format!("{base_url}/SN/index.htm"),
        "--title",
        "相應部",
        "--out",
        tree_path.to_str().unwrap(),
    ])
    .assert()
    .failure();

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn book_writes_epub_with_pages_and_nav() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();
    let temp = tempfile::TempDir::new()?;
    let epub_path = temp.path().join("相應部.epub");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "book",
        "--url",
        &format!("{base_url}/SN/index.htm"),
        "--title",
        "相應部",
        "--prefix",
        "sn",
        "--out",
        epub_path.to_str().unwrap(),
    ])
    .assert()
    .success();

    let names = zip_names(&epub_path)?;
    assert_eq!(names.first().map(String::as_str), Some("mimetype"));
    for expected in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/nav.xhtml",
        "OEBPS/toc.ncx",
        "OEBPS/style.css",
        "OEBPS/Scripts/a.js",
        "OEBPS/introduction.xhtml",
        "OEBPS/Pages/sn0001.xhtml",
        "OEBPS/Pages/sn0002.xhtml",
        "OEBPS/Pages/sn0003.xhtml",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    // Three index entries, three pages.
    let mut pages = names
        .iter()
        .filter(|n| n.starts_with("OEBPS/Pages/"))
        .map(String::as_str)
        .collect::<Vec<_>>();
    pages.sort_unstable();
    assert_eq!(
        pages,
        vec![
            "OEBPS/Pages/sn0001.xhtml",
            "OEBPS/Pages/sn0002.xhtml",
            "OEBPS/Pages/sn0003.xhtml",
        ]
    );
    assert!(!names.iter().any(|n| n == "OEBPS/Pages/sn0004.xhtml"));
    assert_eq!(read_zip_entry(&epub_path, "mimetype")?, "application/epub+zip");

    let nav = read_zip_entry(&epub_path, "OEBPS/nav.xhtml")?;
    assert!(nav.contains("<a href=\"introduction.xhtml\">說明</a>"));
    assert!(nav.contains("<span>諸天相應</span>"));
    assert!(nav.contains("<a href=\"Pages/sn0002.xhtml\">2-3</a>"));
    assert!(nav.find("諸天相應") < nav.find("天子相應"));

    let opf = read_zip_entry(&epub_path, "OEBPS/content.opf")?;
    assert!(opf.contains("<dc:language>zh-TW</dc:language>"));
    assert!(opf.contains("<dc:language>pi</dc:language>"));
    assert!(opf.contains("<dc:title>相應部</dc:title>"));

    let page = read_zip_entry(&epub_path, "OEBPS/Pages/sn0002.xhtml")?;
    assert!(page.contains("<title>2</title>"));
    assert!(page.contains("<h1>解脫經</h1>"));
    assert!(page.contains("<p>有一次，世尊住在舍衛城。</p>"));
    assert!(page.contains("lang=\"pi\""));
    assert!(page.contains("Ekaṃ samayaṃ bhagavā"));
    assert!(page.contains("href=\"../style.css\""));
    assert!(page.contains("src=\"../Scripts/a.js\""));
    assert!(opf.contains("href=\"Pages/sn0002.xhtml\" media-type=\"application/xhtml+xml\" properties=\"scripted\""));

    // The newest Last-Modified among the leaves is what the introduction reports.
    let intro = read_zip_entry(&epub_path, "OEBPS/introduction.xhtml")?;
    assert!(intro.contains("2017-01-03"), "introduction: {intro}");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "book",
        "--url",
        &format!("{base_url}/SN/index.htm"),
        "--title",
        "相應部",
        "--out",
        epub_path.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn build_uses_catalog_and_only_filter() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("books");
    let catalog_path = temp.path().join("catalog.yaml");
    fs::write(
        &catalog_path,
        "path_style: serial\nlanguages: [zh-TW]\ncollections:\n  - key: sn\n    title: 相應部\n    index: SN/index.htm\n  - key: mn\n    title: 中部\n    index: MN/index.htm\n",
    )?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "build",
        "--base-url",
        &format!("{base_url}/"),
        "--out",
        out_dir.to_str().unwrap(),
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--only",
        "sn",
    ])
    .assert()
    .success();

    let epub_path = out_dir.join("相應部.epub");
    assert!(epub_path.exists(), "expected {}", epub_path.display());
    assert!(!out_dir.join("中部.epub").exists());

    let names = zip_names(&epub_path)?;
    assert!(names.iter().any(|n| n == "OEBPS/Pages/sn.1.1.xhtml"));
    assert!(names.iter().any(|n| n == "OEBPS/Pages/sn.1.2.xhtml"));
    assert!(names.iter().any(|n| n == "OEBPS/Pages/sn.2.4.xhtml"));

    let opf = read_zip_entry(&epub_path, "OEBPS/content.opf")?;
    assert!(!opf.contains("<dc:language>pi</dc:language>"));

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn index_with_only_chrome_tables_is_no_content() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();
    let temp = tempfile::TempDir::new()?;
    let out_dir = temp.path().join("books");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "build",
        "--base-url",
        &format!("{base_url}/"),
        "--out",
        out_dir.to_str().unwrap(),
        "--only",
        "mn",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no content entries found for collection 中部"))
    .stderr(predicate::str::contains("/MN/index.htm"));

    assert!(!out_dir.join("中部.epub").exists());

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn missing_leaf_page_fails_the_book() -> anyhow::Result<()> {
    let (base_url, shutdown_tx, server_handle) = spawn_nikaya_server();
    let temp = tempfile::TempDir::new()?;
    let epub_path = temp.path().join("增支部.epub");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.args([
        "book",
        "--url",
        &format!("{base_url}/AN/index.htm"),
        "--title",
        "增支部",
        "--out",
        epub_path.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("AN0404.htm"))
    .stderr(predicate::str::contains("404"));

    assert!(!epub_path.exists());

    let _ = shutdown_tx.send(());
    let _ = server_handle.join();
    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nikayabook");
    cmd.env("RUST_LOG", "debug")
        .args(["index", "--url", "ftp://example.org/SN/index.htm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"))
        .stderr(predicate::str::contains("url must be http/https"));
}
