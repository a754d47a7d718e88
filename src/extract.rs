use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::books::{self, Book};
use crate::reconcile::{Reading, WeekPlan};
use crate::week::normalize_label;

/// Heading that opens the lesson-booklet part of a workbook page.
const STUDY_HEADING: &str = "Congregation Bible Study";

static SCRIPTURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names = books::names_longest_first()
        .iter()
        .map(|n| regex::escape(n).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    // 1 book, 2 chapter, 3 first verse, 4 verse end or span end chapter,
    // 5 end verse of a chapter span, 6 end chapter without verses
    Regex::new(&format!(
        r"\b({names})\s+(\d{{1,3}})\b(?::(\d{{1,3}})(?:\s*-\s*(\d{{1,3}})(?::(\d{{1,3}}))?)?|\s*-\s*(\d{{1,3}})\b)?"
    ))
    .unwrap()
});

static LESSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blessons?\s+(\d{1,3})\b(?:\s*([-,])\s*(?:and\s+)?(?:lessons?\s+)?(\d{1,3})\b)?").unwrap()
});

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseRange {
    pub start: u32,
    pub end: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptureReference {
    pub book: &'static Book,
    pub chapter: u32,
    /// Equal to `chapter` unless the reading spans chapters.
    pub last_chapter: u32,
    pub verses: Option<VerseRange>,
}

impl ScriptureReference {
    pub fn chapters(&self) -> RangeInclusive<u32> {
        self.chapter..=self.last_chapter
    }

    pub fn reading(&self) -> Reading {
        Reading {
            book: self.book,
            chapters: self.chapters().collect(),
        }
    }
}

impl fmt::Display for ScriptureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book.name, self.chapter)?;
        match self.verses {
            Some(VerseRange { start, end }) => {
                write!(f, ":{}", start)?;
                if self.last_chapter != self.chapter {
                    write!(f, "-{}", self.last_chapter)?;
                    if let Some(end) = end {
                        write!(f, ":{}", end)?;
                    }
                } else if let Some(end) = end {
                    write!(f, "-{}", end)?;
                }
                Ok(())
            }
            None if self.last_chapter != self.chapter => write!(f, "-{}", self.last_chapter),
            None => Ok(()),
        }
    }
}

/// Find the first Bible reference in `text`. Later references are incidental.
pub fn extract_scripture(text: &str) -> Option<ScriptureReference> {
    let text = normalize_label(text);
    let caps = SCRIPTURE_RE.captures(&text)?;

    let name = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
    let book = books::find_by_name(&name)?;
    let chapter: u32 = caps[2].parse().ok()?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let (last_chapter, verses) = match num(3) {
        Some(start) => match (num(4), num(5)) {
            // 6:1-7:13
            (Some(end_chapter), Some(end_verse)) => (end_chapter, Some(VerseRange { start, end: Some(end_verse) })),
            // 1:1-31
            (Some(end_verse), None) => (chapter, Some(VerseRange { start, end: Some(end_verse) })),
            _ => (chapter, Some(VerseRange { start, end: None })),
        },
        // 2-3
        None => (num(6).unwrap_or(chapter), None),
    };

    Some(ScriptureReference {
        book,
        chapter,
        last_chapter: last_chapter.max(chapter),
        verses,
    })
}

/// Lesson numbers mentioned in `text`, in order of appearance without repeats.
///
/// `lessons 36-37` is a range; `lessons 53, 54` and a backwards hyphen pair are
/// two separate lessons.
pub fn extract_lessons(text: &str) -> Vec<u32> {
    let text = normalize_label(text);
    let mut seen = HashSet::new();
    let mut lessons = Vec::new();

    for caps in LESSON_RE.captures_iter(&text) {
        let Ok(first) = caps[1].parse::<u32>() else { continue };
        let second = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
        let is_range = caps.get(2).map(|m| m.as_str()) == Some("-");

        let mut group: Vec<u32> = match second {
            Some(second) if is_range && second > first => (first..=second).collect(),
            Some(second) => vec![first, second],
            None => vec![first],
        };
        group.sort_unstable();
        group.dedup();

        for lesson in group {
            if seen.insert(lesson) {
                lessons.push(lesson);
            }
        }
    }

    lessons
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&ndash;", "-")
        .replace("&#8211;", "-")
        .replace("&mdash;", "-")
        .replace("&#8212;", "-")
        .replace("&#x2013;", "-")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Visible text of an HTML page, flattened to a single line.
pub fn page_text(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_scripts, " ");
    let decoded = decode_entities(&without_tags);
    let collapsed = SPACE_RE.replace_all(&decoded, " ");
    normalize_label(&collapsed)
}

/// Build the plan for one week from its workbook page.
pub fn plan_week(label: &str, html: &str) -> WeekPlan {
    let text = page_text(html);
    let scripture = extract_scripture(&text);
    if let Some(s) = &scripture {
        debug!("{}: reading {}", label, s);
    }
    let reading = scripture.map(|s| s.reading());
    let study = text.find(STUDY_HEADING).map_or(text.as_str(), |i| &text[i..]);

    WeekPlan {
        label: label.to_string(),
        reading,
        lessons: extract_lessons(study),
    }
}

// ── Tests ──
