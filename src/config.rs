use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::books;
use crate::reconcile::{Reading, WeekPlan};

/// Optional settings file in the working directory (any format `config` knows).
const SETTINGS_FILE: &str = "mwb_audio";
const ENV_PREFIX: &str = "MWB";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub page_base_url: String,
    pub language: String,
    pub timeout_secs: u64,
    pub months_ahead: u32,
    pub workbook_csv: PathBuf,
    pub sections_csv: PathBuf,
    pub schedule_file: PathBuf,
}

impl Settings {
    /// Defaults, then `mwb_audio.toml` if present, then `MWB_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(File::with_name(SETTINGS_FILE).required(false))
    }

    fn load_from<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .set_default("api_base_url", "https://b.jw-cdn.org/apis/pub-media/GETPUBMEDIALINKS")?
            .set_default("page_base_url", "https://www.jw.org/en/library/jw-meeting-workbook")?
            .set_default("language", "E")?
            .set_default("timeout_secs", 15_i64)?
            .set_default("months_ahead", 6_i64)?
            .set_default("workbook_csv", "meeting_workbook_mp3s.csv")?
            .set_default("sections_csv", "meeting_subsections_mp3s.csv")?
            .set_default("schedule_file", "schedule.toml")?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

/// One hand-maintained week of the meeting schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledWeek {
    pub label: String,
    pub book: Option<String>,
    #[serde(default)]
    pub chapters: Vec<u32>,
    #[serde(default)]
    pub lessons: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    weeks: Vec<ScheduledWeek>,
}

/// Schedule seed data, loaded once at start-up and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Schedule {
    weeks: Vec<WeekPlan>,
}

impl Schedule {
    pub fn load(path: &Path) -> Result<Self> {
        let file: ScheduleFile = Config::builder()
            .add_source(File::from(path).required(true))
            .build()
            .with_context(|| format!("Failed to read schedule {:?}", path))?
            .try_deserialize()
            .with_context(|| format!("Invalid schedule {:?}", path))?;

        let weeks = file
            .weeks
            .into_iter()
            .map(into_plan)
            .collect::<Result<Vec<_>>>()?;
        Ok(Schedule { weeks })
    }

    pub fn weeks(&self) -> &[WeekPlan] {
        &self.weeks
    }
}

fn into_plan(week: ScheduledWeek) -> Result<WeekPlan> {
    let reading = match &week.book {
        Some(name) => {
            let book = books::find_by_name(name)
                .ok_or_else(|| anyhow!("{}: unknown book {:?}", week.label, name))?;
            Some(Reading {
                book,
                chapters: week.chapters.clone(),
            })
        }
        None => None,
    };
    Ok(WeekPlan {
        label: week.label,
        reading,
        lessons: week.lessons,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let s = Settings::load_from(File::from(missing.as_path()).required(false)).unwrap();
        assert_eq!(s.language, "E");
        assert_eq!(s.months_ahead, 6);
        assert_eq!(s.workbook_csv, PathBuf::from("meeting_workbook_mp3s.csv"));
        assert!(s.api_base_url.ends_with("GETPUBMEDIALINKS"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mwb_audio.toml");
        fs::write(&path, "timeout_secs = 30\nsections_csv = \"out/sections.csv\"\n").unwrap();
        let s = Settings::load_from(File::from(path.as_path())).unwrap();
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.sections_csv, PathBuf::from("out/sections.csv"));
        assert_eq!(s.months_ahead, 6);
    }

    #[test]
    fn loads_schedule_fixture() {
        let schedule = Schedule::load(Path::new("tests/fixtures/schedule.toml")).unwrap();
        let weeks = schedule.weeks();
        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[0].label, "November 3-9");
        let reading = weeks[1].reading.as_ref().unwrap();
        assert_eq!(reading.book.number, 22);
        assert_eq!(reading.chapters, vec![3, 4, 5]);
        assert_eq!(weeks[2].lessons, vec![47, 48]);
        assert!(weeks[2].label.contains('\u{2013}'));
    }

    #[test]
    fn unknown_book_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        fs::write(&path, "[[weeks]]\nlabel = \"May 4-10\"\nbook = \"Hezekiah\"\nchapters = [1]\n").unwrap();
        let err = Schedule::load(&path).unwrap_err();
        assert!(err.to_string().contains("Hezekiah"));
    }

    #[test]
    fn shipped_schedule_is_valid() {
        let schedule = Schedule::load(Path::new("schedule.toml")).unwrap();
        assert!(!schedule.weeks().is_empty());
        assert!(schedule.weeks().iter().all(|w| w.reading.is_some()));
    }
}
