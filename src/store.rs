use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::reconcile::OutputRow;
use crate::week::normalize_label;

const WEEK_COLUMN: &str = "Meeting Week";

/// One week of the two-column workbook CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookRow {
    #[serde(rename = "Meeting Week")]
    pub week: String,
    #[serde(rename = "MP3 URL")]
    pub url: String,
}

/// A row type with a fixed CSV header.
pub trait CsvRecord: Serialize + DeserializeOwned {
    const HEADER: &'static [&'static str];
}

impl CsvRecord for WorkbookRow {
    const HEADER: &'static [&'static str] = &["Meeting Week", "MP3 URL"];
}

impl CsvRecord for OutputRow {
    const HEADER: &'static [&'static str] = &["Meeting Week", "Section", "Reference", "MP3 URL"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn reader(path: &Path) -> Result<csv::Reader<fs::File>, StoreError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))
}

fn is_blank(path: &Path) -> Result<bool, StoreError> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::metadata(path).map_err(io_error(path))?.len() == 0)
}

/// Week labels in file order, taken from the "Meeting Week" column.
pub fn read_weeks(path: &Path) -> Result<Vec<String>, StoreError> {
    let mut reader = reader(path)?;
    let column = reader
        .headers()
        .map_err(csv_error(path))?
        .iter()
        .position(|h| h == WEEK_COLUMN)
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.display().to_string(),
            column: WEEK_COLUMN,
        })?;

    let mut weeks = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error(path))?;
        if let Some(week) = record.get(column).filter(|w| !w.is_empty()) {
            weeks.push(week.to_string());
        }
    }
    Ok(weeks)
}

/// Normalized labels already present in `path`. A missing or empty file has none.
pub fn read_existing(path: &Path) -> Result<HashSet<String>, StoreError> {
    if is_blank(path)? {
        return Ok(HashSet::new());
    }
    Ok(read_weeks(path)?.iter().map(|w| normalize_label(w)).collect())
}

/// All rows of a CSV written by [`write`].
pub fn read_rows<R: CsvRecord>(path: &Path) -> Result<Vec<R>, StoreError> {
    reader(path)?
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(csv_error(path))
}

/// State of an existing file before appending: `None` when it has no header
/// yet, otherwise whether a line break is needed before the next row.
fn check_header(path: &Path, expected: &[&str]) -> Result<Option<bool>, StoreError> {
    if is_blank(path)? {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let found: Vec<String> = match reader.records().next() {
        Some(record) => record.map_err(csv_error(path))?.iter().map(str::to_string).collect(),
        None => Vec::new(),
    };
    if found != expected {
        return Err(StoreError::HeaderMismatch {
            path: path.display().to_string(),
            found,
            expected: expected.iter().map(|s| s.to_string()).collect(),
        });
    }
    Ok(Some(!content.ends_with('\n')))
}

/// Write rows to `path`. Overwrite replaces the file and always writes the
/// header; append creates the file with a header when needed and refuses a
/// file whose header does not match.
pub fn write<R: CsvRecord>(path: &Path, rows: &[R], mode: WriteMode) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(path))?;
    }

    let (mut file, write_header) = match mode {
        WriteMode::Overwrite => (fs::File::create(path).map_err(io_error(path))?, true),
        WriteMode::Append => {
            let state = check_header(path, R::HEADER)?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(io_error(path))?;
            if state == Some(true) {
                file.write_all(b"\n").map_err(io_error(path))?;
            }
            (file, state.is_none())
        }
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut file);
    if write_header {
        writer.write_record(R::HEADER).map_err(csv_error(path))?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error(path))?;
    }
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

/// Append the rows whose normalized week is not yet in `path`, or repeated in
/// `rows`. Returns the rows that were written.
pub fn append_new_weeks(path: &Path, rows: Vec<WorkbookRow>) -> Result<Vec<WorkbookRow>, StoreError> {
    let mut known = read_existing(path)?;
    let fresh: Vec<WorkbookRow> = rows
        .into_iter()
        .filter(|r| known.insert(normalize_label(&r.week)))
        .collect();
    if !fresh.is_empty() {
        write(path, &fresh, WriteMode::Append)?;
    }
    Ok(fresh)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::SectionKind;

    fn row(week: &str, url: &str) -> WorkbookRow {
        WorkbookRow {
            week: week.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn append_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/workbook.csv");
        let written = append_new_weeks(&path, vec![row("November 3-9", "u1")]).unwrap();
        assert_eq!(written.len(), 1);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Meeting Week,MP3 URL\nNovember 3-9,u1\n");
    }

    #[test]
    fn dash_variants_are_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.csv");
        append_new_weeks(&path, vec![row("December 29–January 4", "u1")]).unwrap();

        let written = append_new_weeks(
            &path,
            vec![
                row("December 29-January 4", "u1"),
                row("December 29\u{200B}—January 4", "u1"),
                row("January 5-11", "u2"),
                row("January 5–11", "u2"),
            ],
        )
        .unwrap();
        assert_eq!(written, vec![row("January 5-11", "u2")]);
        assert_eq!(read_weeks(&path).unwrap(), vec!["December 29–January 4", "January 5-11"]);
    }

    #[test]
    fn nothing_new_leaves_missing_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.csv");
        assert!(append_new_weeks(&path, vec![]).unwrap().is_empty());
        assert!(!path.exists());
        assert!(read_existing(&path).unwrap().is_empty());
    }

    #[test]
    fn append_after_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.csv");
        fs::write(&path, "Meeting Week,MP3 URL\nNovember 3-9,u1").unwrap();
        append_new_weeks(&path, vec![row("November 10-16", "u2")]).unwrap();
        assert_eq!(read_weeks(&path).unwrap(), vec!["November 3-9", "November 10-16"]);
    }

    #[test]
    fn append_rejects_foreign_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sections.csv");
        fs::write(&path, "Meeting Week,Section,Reference,MP3 URL\n").unwrap();
        let err = write(&path, &[row("November 3-9", "u1")], WriteMode::Append).unwrap_err();
        assert!(matches!(err, StoreError::HeaderMismatch { .. }));
    }

    #[test]
    fn overwrite_sections_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sections.csv");
        fs::write(&path, "stale\n").unwrap();
        let rows = vec![
            OutputRow {
                week: "November 17-23".into(),
                section: SectionKind::BibleReading,
                reference: "Song of Solomon 6".into(),
                url: "b6".into(),
            },
            OutputRow {
                week: "November 17-23".into(),
                section: SectionKind::CongregationStudy,
                reference: "Lesson 36".into(),
                url: "l36".into(),
            },
        ];
        write(&path, &rows, WriteMode::Overwrite).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Meeting Week,Section,Reference,MP3 URL\n"));
        assert!(text.contains("November 17-23,Bible Reading,Song of Solomon 6,b6\n"));
        assert_eq!(read_rows::<OutputRow>(&path).unwrap(), rows);
    }

    #[test]
    fn reads_labels_with_spaced_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.csv");
        fs::write(&path, "Meeting Week, MP3 URL\n\"November 3–9\", u1\n").unwrap();
        let existing = read_existing(&path).unwrap();
        assert!(existing.contains("November 3-9"));
        assert_eq!(read_rows::<WorkbookRow>(&path).unwrap(), vec![row("November 3–9", "u1")]);
    }
}
