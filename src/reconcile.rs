use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::books::Book;
use crate::week::normalize_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    #[serde(rename = "Bible Reading")]
    BibleReading,
    #[serde(rename = "Congregation Bible Study")]
    CongregationStudy,
}

/// Chapters of one book read during a week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub book: &'static Book,
    pub chapters: Vec<u32>,
}

/// Everything known about one week before URLs are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekPlan {
    pub label: String,
    pub reading: Option<Reading>,
    pub lessons: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "Meeting Week")]
    pub week: String,
    #[serde(rename = "Section")]
    pub section: SectionKind,
    #[serde(rename = "Reference")]
    pub reference: String,
    #[serde(rename = "MP3 URL")]
    pub url: String,
}

/// Source of audio URLs for chapters and lessons.
pub trait MediaIndex {
    fn chapter_url(&mut self, book: &Book, chapter: u32) -> Option<String>;
    fn lesson_url(&mut self, lesson: u32) -> Option<String>;
}

/// Turn week plans into output rows: per week, readings then lessons, each ascending.
pub fn reconcile<I: MediaIndex>(weeks: &[WeekPlan], index: &mut I) -> Vec<OutputRow> {
    let mut seen: HashSet<(String, SectionKind, String)> = HashSet::new();
    let mut rows = Vec::new();

    let mut push = |rows: &mut Vec<OutputRow>, week: &str, section: SectionKind, reference: String, url: String| {
        if seen.insert((normalize_label(week), section, reference.clone())) {
            rows.push(OutputRow {
                week: week.to_string(),
                section,
                reference,
                url,
            });
        }
    };

    for week in weeks {
        if let Some(reading) = &week.reading {
            let mut chapters = reading.chapters.clone();
            chapters.sort_unstable();
            for chapter in chapters {
                match index.chapter_url(reading.book, chapter) {
                    Some(url) => {
                        let reference = format!("{} {}", reading.book.name, chapter);
                        push(&mut rows, &week.label, SectionKind::BibleReading, reference, url);
                    }
                    None => info!("{}: no audio for {} {}", week.label, reading.book.name, chapter),
                }
            }
        }

        let mut lessons = week.lessons.clone();
        lessons.sort_unstable();
        for lesson in lessons {
            match index.lesson_url(lesson) {
                Some(url) => {
                    push(&mut rows, &week.label, SectionKind::CongregationStudy, format!("Lesson {}", lesson), url);
                }
                None => info!("{}: no audio for lesson {}", week.label, lesson),
            }
        }
    }

    rows
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::find_by_name;
    use std::collections::{BTreeMap, HashMap};

    /// In-memory index, keyed by book number.
    #[derive(Debug, Default)]
    struct StaticIndex {
        chapters: HashMap<u32, BTreeMap<u32, String>>,
        lessons: BTreeMap<u32, String>,
    }

    impl MediaIndex for StaticIndex {
        fn chapter_url(&mut self, book: &Book, chapter: u32) -> Option<String> {
            self.chapters.get(&book.number)?.get(&chapter).cloned()
        }

        fn lesson_url(&mut self, lesson: u32) -> Option<String> {
            self.lessons.get(&lesson).cloned()
        }
    }

    fn index() -> StaticIndex {
        let isaiah = find_by_name("Isaiah").unwrap();
        let mut index = StaticIndex::default();
        index.chapters.insert(
            isaiah.number,
            BTreeMap::from([(1, "url1".to_string()), (2, "url2".to_string())]),
        );
        index.lessons = BTreeMap::from([(40, "l40".to_string()), (41, "l41".to_string())]);
        index
    }

    fn plan(label: &str, chapters: Vec<u32>, lessons: Vec<u32>) -> WeekPlan {
        WeekPlan {
            label: label.to_string(),
            reading: Some(Reading {
                book: find_by_name("Isaiah").unwrap(),
                chapters,
            }),
            lessons,
        }
    }

    #[test]
    fn missing_chapter_is_skipped() {
        let rows = reconcile(&[plan("December 1-7", vec![2, 3], vec![])], &mut index());
        assert_eq!(
            rows,
            vec![OutputRow {
                week: "December 1-7".into(),
                section: SectionKind::BibleReading,
                reference: "Isaiah 2".into(),
                url: "url2".into(),
            }]
        );
    }

    #[test]
    fn readings_before_lessons_in_ascending_order() {
        let rows = reconcile(&[plan("December 1-7", vec![2, 1], vec![41, 40, 99])], &mut index());
        let refs: Vec<(SectionKind, &str)> = rows
            .iter()
            .map(|r| (r.section, r.reference.as_str()))
            .collect();
        assert_eq!(
            refs,
            vec![
                (SectionKind::BibleReading, "Isaiah 1"),
                (SectionKind::BibleReading, "Isaiah 2"),
                (SectionKind::CongregationStudy, "Lesson 40"),
                (SectionKind::CongregationStudy, "Lesson 41"),
            ]
        );
    }

    #[test]
    fn weeks_keep_input_order_and_rows_are_unique() {
        let weeks = [
            plan("December 8-14", vec![2], vec![41]),
            plan("December 1-7", vec![1, 1], vec![40, 40]),
            plan("December 8-14", vec![2], vec![41]),
        ];
        let rows = reconcile(&weeks, &mut index());
        let labels: Vec<&str> = rows.iter().map(|r| r.week.as_str()).collect();
        assert_eq!(labels, vec!["December 8-14", "December 8-14", "December 1-7", "December 1-7"]);
    }

    #[test]
    fn dash_variants_of_a_label_are_one_week() {
        let weeks = [
            plan("December 29–January 4", vec![1], vec![40]),
            plan("December 29-January 4", vec![1, 2], vec![40]),
        ];
        let rows = reconcile(&weeks, &mut index());
        let refs: Vec<&str> = rows.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(refs, vec!["Isaiah 1", "Lesson 40", "Isaiah 2"]);
        assert_eq!(rows[2].week, "December 29-January 4");
    }

    #[test]
    fn week_without_reading_only_has_lessons() {
        let week = WeekPlan {
            label: "December 15-21".into(),
            reading: None,
            lessons: vec![40],
        };
        let rows = reconcile(&[week], &mut index());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].section, SectionKind::CongregationStudy);
        assert_eq!(rows[0].reference, "Lesson 40");
    }
}
