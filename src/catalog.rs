use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::CatalogQuery;
use crate::books::Book;
use crate::error::FetchError;
use crate::reconcile::MediaIndex;
use crate::store::WorkbookRow;
use crate::week::month_number;

static CHAPTER_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(\d+)\.mp3$").unwrap());

/// Response of the publication media endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PubMedia {
    #[serde(default)]
    pub files: BTreeMap<String, LanguageFiles>,
}

/// Per-language format groups. Only MP3 is used.
#[derive(Debug, Default, Deserialize)]
pub struct LanguageFiles {
    #[serde(rename = "MP3", default, deserialize_with = "lenient_items")]
    pub mp3: Option<Vec<MediaItem>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaItem {
    #[serde(default, deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub file: Option<FileRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileRef {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

/// A field of the wrong shape reads as its default instead of failing the
/// whole catalog.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// A malformed entry becomes an empty item so list positions are kept.
fn lenient_items<'de, D>(deserializer: D) -> Result<Option<Vec<MediaItem>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_array().map(|items| {
        items
            .iter()
            .map(|item| MediaItem::deserialize(item).unwrap_or_default())
            .collect()
    }))
}

impl MediaItem {
    pub fn url(&self) -> Option<&str> {
        self.file
            .as_ref()
            .and_then(|f| f.url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

impl PubMedia {
    /// MP3 list of the first language group that has one.
    pub fn mp3_items(&self) -> &[MediaItem] {
        self.files
            .values()
            .find_map(|group| group.mp3.as_deref())
            .unwrap_or_default()
    }
}

fn chapter_number(item: &MediaItem, url: &str) -> Option<u32> {
    item.title.trim().parse().ok().or_else(|| {
        CHAPTER_SUFFIX_RE
            .captures(url)
            .and_then(|c| c[1].parse().ok())
    })
}

/// Chapter number → URL for a Bible book catalog.
pub fn index_chapters(media: &PubMedia) -> BTreeMap<u32, String> {
    let mut chapters = BTreeMap::new();
    for item in media.mp3_items() {
        let Some(url) = item.url() else { continue };
        match chapter_number(item, url) {
            Some(chapter) => {
                chapters.entry(chapter).or_insert_with(|| url.to_string());
            }
            None => debug!("no chapter number in {:?} ({})", item.title, url),
        }
    }
    chapters
}

/// Lesson number → URL for the lesson booklet.
pub fn index_lessons(media: &PubMedia) -> BTreeMap<u32, String> {
    lesson_position_index(media.mp3_items())
}

/// The lesson booklet carries no lesson number per item: a lesson's number is
/// its zero-based position in the MP3 list. If upstream ever reorders the list
/// this is the one place that has to change.
pub fn lesson_position_index(items: &[MediaItem]) -> BTreeMap<u32, String> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| Some((i as u32, item.url()?.to_string())))
        .collect()
}

fn is_week_title(title: &str) -> bool {
    let starts_with_month = title
        .split_whitespace()
        .next()
        .and_then(month_number)
        .is_some();
    starts_with_month && title.contains(['-', '\u{2013}', '\u{2014}'])
}

/// Weekly recordings of a workbook issue (titles are date ranges).
pub fn weekly_items(media: &PubMedia) -> Vec<WorkbookRow> {
    media
        .mp3_items()
        .iter()
        .filter(|item| is_week_title(&item.title))
        .filter_map(|item| {
            Some(WorkbookRow {
                week: item.title.trim().to_string(),
                url: item.url()?.to_string(),
            })
        })
        .collect()
}

/// Lazily filled chapter and lesson tables. Each catalog is loaded at most
/// once per run; a failed or unpublished catalog is remembered as an empty table.
pub struct CatalogCache<L> {
    load: L,
    chapters: HashMap<u32, BTreeMap<u32, String>>,
    lessons: Option<BTreeMap<u32, String>>,
}

impl<L> CatalogCache<L>
where
    L: FnMut(&CatalogQuery) -> Result<Option<PubMedia>, FetchError>,
{
    pub fn new(load: L) -> Self {
        CatalogCache {
            load,
            chapters: HashMap::new(),
            lessons: None,
        }
    }

    fn fetch(&mut self, query: &CatalogQuery) -> PubMedia {
        match (self.load)(query) {
            Ok(Some(media)) => media,
            Ok(None) => {
                debug!("{} not published", query);
                PubMedia::default()
            }
            Err(e) => {
                warn!("{}", e);
                PubMedia::default()
            }
        }
    }

    pub fn chapters(&mut self, book: &Book) -> &BTreeMap<u32, String> {
        if !self.chapters.contains_key(&book.number) {
            let table = index_chapters(&self.fetch(&CatalogQuery::BibleBook(book.number)));
            info!("{}: {} chapters", book.name, table.len());
            self.chapters.insert(book.number, table);
        }
        &self.chapters[&book.number]
    }

    pub fn lessons(&mut self) -> &BTreeMap<u32, String> {
        if self.lessons.is_none() {
            let table = index_lessons(&self.fetch(&CatalogQuery::Lessons));
            info!("Loaded {} lessons", table.len());
            self.lessons = Some(table);
        }
        self.lessons.get_or_insert_with(BTreeMap::new)
    }
}

impl<L> MediaIndex for CatalogCache<L>
where
    L: FnMut(&CatalogQuery) -> Result<Option<PubMedia>, FetchError>,
{
    fn chapter_url(&mut self, book: &Book, chapter: u32) -> Option<String> {
        self.chapters(book).get(&chapter).cloned()
    }

    fn lesson_url(&mut self, lesson: u32) -> Option<String> {
        self.lessons().get(&lesson).cloned()
    }
}

// ── Tests ──
