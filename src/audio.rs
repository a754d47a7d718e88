use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

const DOWNLOAD_HOST: &str = "www.jw.org";
const NEXT_DATA_FILES: &str = "/props/pageProps/listData/files";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("bad selector {:?}: {}", css, e))
}

fn is_mp3(url: &str) -> bool {
    url.to_ascii_lowercase().ends_with(".mp3")
}

/// Download pages list every file of a publication issue.
pub fn is_download_page(url: &str) -> bool {
    Url::parse(url)
        .map(|u| {
            u.host_str().is_some_and(|h| h.ends_with(DOWNLOAD_HOST)) && u.path().contains("download")
        })
        .unwrap_or(false)
}

/// MP3 links of a download page: the embedded Next.js data, then plain anchors.
pub fn download_page_links(html: &str, page_url: &str) -> Result<BTreeSet<String>> {
    let base = Url::parse(page_url).with_context(|| format!("Invalid URL {}", page_url))?;
    let doc = Html::parse_document(html);
    let mut links = BTreeSet::new();

    if let Some(script) = doc.select(&selector("script#__NEXT_DATA__")?).next() {
        let data: Value = serde_json::from_str(&script.text().collect::<String>())
            .context("Invalid __NEXT_DATA__ payload")?;
        let files = data
            .pointer(NEXT_DATA_FILES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        links.extend(
            files
                .iter()
                .filter_map(|f| f.get("fileUrl")?.as_str())
                .filter(|u| is_mp3(u))
                .map(str::to_string),
        );
    }

    for a in doc.select(&selector("a[href]")?) {
        if let Some(href) = a.value().attr("href").filter(|h| is_mp3(h)) {
            if let Ok(url) = base.join(href) {
                links.insert(url.to_string());
            }
        }
    }

    Ok(links)
}

/// MP3 links of an ordinary page: anchors plus `<source>` and `<audio>` sources.
pub fn week_page_links(html: &str, page_url: &str) -> Result<BTreeSet<String>> {
    let base = Url::parse(page_url).with_context(|| format!("Invalid URL {}", page_url))?;
    let doc = Html::parse_document(html);
    let mut links = BTreeSet::new();

    for (css, attr) in [("a[href]", "href"), ("source[src]", "src"), ("audio[src]", "src")] {
        for el in doc.select(&selector(css)?) {
            let Some(raw) = el.value().attr(attr).filter(|v| is_mp3(v)) else { continue };
            match base.join(raw) {
                Ok(url) => {
                    links.insert(url.to_string());
                }
                Err(e) => debug!("skipping {:?}: {}", raw, e),
            }
        }
    }

    Ok(links)
}

/// Pick the scanner by page kind.
pub fn page_links(html: &str, page_url: &str) -> Result<BTreeSet<String>> {
    if is_download_page(page_url) {
        download_page_links(html, page_url)
    } else {
        week_page_links(html, page_url)
    }
}

/// Human label from the last path segment, e.g.
/// `.../Life-and-Ministry-Meeting-Schedule-for-November-3-9-2025/` →
/// `Life and ministry meeting schedule for november 3 9 2025`.
pub fn label_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let path = parsed.path().trim_end_matches('/');
    let Some(segment) = path.rsplit('/').next().filter(|s| !s.is_empty()) else {
        return url.to_string();
    };

    let cleaned = segment.replace('-', " ");
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK_URL: &str = "https://www.jw.org/en/library/jw-meeting-workbook/november-december-2025-mwb/Life-and-Ministry-Meeting-Schedule-for-November-3-9-2025/";
    const DOWNLOAD_URL: &str = "https://www.jw.org/download/?issue=202511&output=html&pub=mwb&fileformat=MP3%2CAAC&alllangs=0&langwritten=E&txtCMSLang=E&isBible=0";

    #[test]
    fn recognizes_download_pages() {
        assert!(is_download_page(DOWNLOAD_URL));
        assert!(!is_download_page(WEEK_URL));
        assert!(!is_download_page("https://example.com/download/"));
        assert!(!is_download_page("not a url"));
    }

    #[test]
    fn download_page_merges_next_data_and_anchors() {
        let html = std::fs::read_to_string("tests/fixtures/download_page.html").unwrap();
        let links: Vec<String> = download_page_links(&html, DOWNLOAD_URL).unwrap().into_iter().collect();
        assert_eq!(
            links,
            vec![
                "https://cfp2.jw-cdn.org/a/w1/1/o/mwb_E_202511_01.mp3",
                "https://cfp2.jw-cdn.org/a/w2/1/o/mwb_E_202511_02.mp3",
                "https://www.jw.org/media/mwb_E_202511_03.MP3",
            ]
        );
    }

    #[test]
    fn download_page_without_next_data() {
        let html = r#"<html><body><a href="https://cdn.example/x.mp3">x</a><a href="x.m4a">y</a></body></html>"#;
        let links = download_page_links(html, DOWNLOAD_URL).unwrap();
        assert_eq!(links.into_iter().collect::<Vec<_>>(), vec!["https://cdn.example/x.mp3"]);
    }

    #[test]
    fn week_page_collects_all_sources() {
        let html = r#"<html><body>
            <a href="/media/b.mp3">b</a>
            <a href="https://cdn.example/a.mp3">a</a>
            <a href="https://cdn.example/a.mp3">dup</a>
            <a href="/media/page.html">page</a>
            <audio src="c.mp3"></audio>
            <audio controls><source src="https://cdn.example/d.mp3" type="audio/mpeg"></audio>
        </body></html>"#;
        let links: Vec<String> = week_page_links(html, WEEK_URL).unwrap().into_iter().collect();
        assert_eq!(
            links,
            vec![
                "https://cdn.example/a.mp3",
                "https://cdn.example/d.mp3",
                "https://www.jw.org/en/library/jw-meeting-workbook/november-december-2025-mwb/Life-and-Ministry-Meeting-Schedule-for-November-3-9-2025/c.mp3",
                "https://www.jw.org/media/b.mp3",
            ]
        );
    }

    #[test]
    fn page_without_audio_is_empty() {
        assert!(page_links("<p>nothing here</p>", WEEK_URL).unwrap().is_empty());
    }

    #[test]
    fn labels_from_urls() {
        assert_eq!(
            label_from_url(WEEK_URL),
            "Life and ministry meeting schedule for november 3 9 2025"
        );
        assert_eq!(label_from_url("https://www.jw.org/"), "https://www.jw.org/");
        assert_eq!(label_from_url("https://www.jw.org/download/?pub=mwb"), "Download");
    }
}
