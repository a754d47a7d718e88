use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{issue_codes, CatalogQuery, MediaApi};
use crate::audio;
use crate::catalog::{weekly_items, CatalogCache, PubMedia};
use crate::config::{Schedule, Settings};
use crate::error::FetchError;
use crate::extract::plan_week;
use crate::reconcile::{reconcile, OutputRow, SectionKind, WeekPlan};
use crate::store::{self, WorkbookRow, WriteMode};
use crate::week::{infer_start_year, label_month_day, normalize_label, workbook_page_url, WeekCursor};

pub fn current_year() -> i32 {
    Local::now().year()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ── workbook ──

pub struct WorkbookStats {
    pub issues: usize,
    pub found: usize,
    pub added: Vec<WorkbookRow>,
}

/// A weekly recording and the issue (`YYYYMM`) that listed it.
pub struct IssueWeek {
    pub issue: String,
    pub row: WorkbookRow,
}

/// Weekly workbook recordings of `issues`, in issue order.
pub fn weekly_rows<F>(issues: &[String], mut load: F) -> Vec<IssueWeek>
where
    F: FnMut(&CatalogQuery) -> Result<Option<PubMedia>, FetchError>,
{
    let mut weeks = Vec::new();
    for issue in issues {
        let query = CatalogQuery::Workbook { issue: issue.clone() };
        match load(&query) {
            Ok(Some(media)) => {
                let rows = weekly_items(&media);
                debug!("{}: {} weeks", query, rows.len());
                weeks.extend(rows.into_iter().map(|row| IssueWeek {
                    issue: issue.clone(),
                    row,
                }));
            }
            Ok(None) => debug!("{} not published yet", query),
            Err(e) => warn!("{}", e),
        }
    }
    weeks
}

/// Year of the first datable week, taken from the issue that listed it. An
/// issue may open with the last week of the previous year.
pub fn first_week_year(weeks: &[IssueWeek]) -> Option<i32> {
    let (week, month) = weeks
        .iter()
        .find_map(|w| label_month_day(&w.row.week).ok().map(|(month, _)| (w, month)))?;
    let year: i32 = week.issue.get(..4)?.parse().ok()?;
    let issue_month: u32 = week.issue.get(4..6)?.parse().ok()?;
    Some(if month > issue_month + 6 { year - 1 } else { year })
}

/// Day `path` was last written, or today when that is unknown.
fn written_on(path: &Path) -> NaiveDate {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).date_naive())
        .unwrap_or_else(|_| today())
}

/// Start year of the labels stored in `path`, anchored on when the file was written.
pub fn csv_start_year<S: AsRef<str>>(path: &Path, labels: &[S], months_ahead: u32) -> Option<i32> {
    infer_start_year(labels, written_on(path), months_ahead)
}

pub fn workbook(settings: &Settings) -> Result<WorkbookStats> {
    let api = MediaApi::new(settings)?;
    let issues = issue_codes(today(), settings.months_ahead);
    let rows: Vec<WorkbookRow> = weekly_rows(&issues, |q| api.fetch_catalog(q))
        .into_iter()
        .map(|w| w.row)
        .collect();
    let found = rows.len();

    let added = store::append_new_weeks(&settings.workbook_csv, rows)
        .with_context(|| format!("Failed to update {:?}", settings.workbook_csv))?;
    for row in &added {
        info!("Added {}", row.week);
    }

    Ok(WorkbookStats {
        issues: issues.len(),
        found,
        added,
    })
}

// ── sections / schedule ──

pub struct SectionStats {
    pub weeks: usize,
    pub planned: usize,
    pub rows: usize,
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Date each label, fetch its workbook page and extract the week plan.
/// Labels that fail to parse and pages that cannot be fetched are skipped.
pub fn plan_weeks<F>(
    labels: &[String],
    start_year: i32,
    page_base_url: &str,
    pb: &ProgressBar,
    mut fetch: F,
) -> Vec<WeekPlan>
where
    F: FnMut(&str) -> Result<Option<String>, FetchError>,
{
    let mut cursor = WeekCursor::new(start_year);
    let mut plans = Vec::new();

    for label in labels {
        pb.set_message(label.clone());
        let start = match cursor.advance(label) {
            Ok(start) => start,
            Err(e) => {
                warn!("Skipping {:?}: {}", label, e);
                pb.inc(1);
                continue;
            }
        };

        debug!("{} starts {} (year {})", label, start, cursor.year());
        let url = workbook_page_url(page_base_url, label, start);
        match fetch(&url) {
            Ok(Some(html)) => {
                let plan = plan_week(label, &html);
                if plan.reading.is_none() {
                    info!("{}: no Bible reading found", label);
                }
                if plan.lessons.is_empty() {
                    info!("{}: no lessons found", label);
                }
                plans.push(plan);
            }
            Ok(None) => info!("{}: page not published ({})", label, url),
            Err(e) => warn!("{}: {}", label, e),
        }
        pb.inc(1);
    }

    plans
}

/// Labels in order with dash and spacing variants collapsed.
fn unique_labels(labels: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .filter(|l| seen.insert(normalize_label(l)))
        .collect()
}

pub fn sections(settings: &Settings, from_api: bool, start_year: Option<i32>) -> Result<SectionStats> {
    let api = MediaApi::new(settings)?;

    let (labels, inferred_year) = if from_api {
        let issues = issue_codes(today(), settings.months_ahead);
        let weeks = weekly_rows(&issues, |q| api.fetch_catalog(q));
        let year = first_week_year(&weeks);
        (unique_labels(weeks.into_iter().map(|w| w.row.week)), year)
    } else {
        let path = &settings.workbook_csv;
        if !path.exists() {
            bail!("{:?} not found. Run `workbook` first or pass --from-api.", path);
        }
        let weeks = store::read_weeks(path).with_context(|| format!("Failed to read {:?}", path))?;
        let year = csv_start_year(path, &weeks[..], settings.months_ahead);
        (unique_labels(weeks), year)
    };
    let start_year = start_year.or(inferred_year).unwrap_or_else(current_year);
    info!("{} weeks, starting in {}", labels.len(), start_year);

    let pb = progress_bar(labels.len())?;
    let plans = plan_weeks(&labels, start_year, &settings.page_base_url, &pb, |url| api.fetch_page(url));
    pb.finish_and_clear();

    let mut cache = CatalogCache::new(|q: &CatalogQuery| api.fetch_catalog(q));
    let rows = reconcile(&plans, &mut cache);
    store::write(&settings.sections_csv, &rows, WriteMode::Overwrite)
        .with_context(|| format!("Failed to write {:?}", settings.sections_csv))?;

    Ok(SectionStats {
        weeks: labels.len(),
        planned: plans.len(),
        rows: rows.len(),
    })
}

pub fn schedule(settings: &Settings) -> Result<SectionStats> {
    let schedule = Schedule::load(&settings.schedule_file)?;
    let api = MediaApi::new(settings)?;
    let mut cache = CatalogCache::new(|q: &CatalogQuery| api.fetch_catalog(q));

    let rows = reconcile(schedule.weeks(), &mut cache);
    store::write(&settings.sections_csv, &rows, WriteMode::Overwrite)
        .with_context(|| format!("Failed to write {:?}", settings.sections_csv))?;

    Ok(SectionStats {
        weeks: schedule.weeks().len(),
        planned: schedule.weeks().len(),
        rows: rows.len(),
    })
}

// ── extract ──

pub struct ExtractStats {
    pub pages: usize,
    pub links: usize,
    pub failed: usize,
}

/// URLs from the command line, then non-blank, non-comment lines of `from_file`.
pub fn collect_urls(urls: Vec<String>, from_file: Option<&Path>) -> Result<Vec<String>> {
    let mut all = urls;
    if let Some(path) = from_file {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        all.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(all)
}

pub fn extract(settings: &Settings, urls: Vec<String>, from_file: Option<&Path>, timeout: u64) -> Result<ExtractStats> {
    let urls = collect_urls(urls, from_file)?;
    if urls.is_empty() {
        bail!("Provide at least one URL via arguments or --from-file");
    }

    let settings = Settings {
        timeout_secs: timeout,
        ..settings.clone()
    };
    let api = MediaApi::new(&settings)?;

    let mut out = csv::Writer::from_writer(io::stdout());
    out.write_record(["label", "page_url", "mp3_url"])?;

    let mut stats = ExtractStats {
        pages: urls.len(),
        links: 0,
        failed: 0,
    };
    for page_url in &urls {
        let links = match api.fetch_page(page_url) {
            Ok(Some(html)) => audio::page_links(&html, page_url),
            Ok(None) => Err(anyhow::anyhow!("HTTP 404")),
            Err(e) => Err(e.into()),
        };
        let links = match links {
            Ok(links) => links,
            Err(e) => {
                eprintln!("ERROR,{},{:#}", page_url, e);
                stats.failed += 1;
                continue;
            }
        };
        if links.is_empty() {
            eprintln!("WARNING: no MP3 links found on {}", page_url);
            continue;
        }

        let label = audio::label_from_url(page_url);
        for mp3 in &links {
            out.write_record([label.as_str(), page_url.as_str(), mp3.as_str()])?;
        }
        stats.links += links.len();
    }
    out.flush()?;

    Ok(stats)
}

// ── overrides ──

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct MeetingSections {
    pub bible_reading: Vec<String>,
    pub congregation_study: Vec<String>,
}

/// Audio URLs keyed by the ISO date of each week's first day.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    pub workbook: BTreeMap<String, String>,
    pub sections: BTreeMap<String, MeetingSections>,
}

pub fn build_overrides(
    workbook: &[WorkbookRow],
    workbook_year: i32,
    sections: &[OutputRow],
    sections_year: i32,
) -> Overrides {
    let mut overrides = Overrides::default();

    let mut cursor = WeekCursor::new(workbook_year);
    for row in workbook {
        match cursor.advance(&row.week) {
            Ok(start) => {
                overrides.workbook.insert(start.to_string(), row.url.clone());
            }
            Err(e) => warn!("Skipping {:?}: {}", row.week, e),
        }
    }

    let mut cursor = WeekCursor::new(sections_year);
    for row in sections {
        let start = match cursor.advance(&row.week) {
            Ok(start) => start,
            Err(e) => {
                warn!("Skipping {:?}: {}", row.week, e);
                continue;
            }
        };
        let entry = overrides.sections.entry(start.to_string()).or_default();
        match row.section {
            SectionKind::BibleReading => entry.bible_reading.push(row.url.clone()),
            SectionKind::CongregationStudy => entry.congregation_study.push(row.url.clone()),
        }
    }

    overrides
}

fn read_if_present<R: store::CsvRecord>(path: &Path) -> Result<Vec<R>> {
    if !path.exists() {
        warn!("{:?} not found", path);
        return Ok(Vec::new());
    }
    store::read_rows(path).with_context(|| format!("Failed to read {:?}", path))
}

pub fn overrides(settings: &Settings, start_year: Option<i32>) -> Result<Overrides> {
    let workbook: Vec<WorkbookRow> = read_if_present(&settings.workbook_csv)?;
    let sections: Vec<OutputRow> = read_if_present(&settings.sections_csv)?;

    let year_of = |path: &Path, labels: Vec<&str>| {
        start_year
            .or_else(|| csv_start_year(path, &labels[..], settings.months_ahead))
            .unwrap_or_else(current_year)
    };
    let workbook_year = year_of(settings.workbook_csv.as_path(), workbook.iter().map(|r| r.week.as_str()).collect());
    let sections_year = year_of(settings.sections_csv.as_path(), sections.iter().map(|r| r.week.as_str()).collect());

    Ok(build_overrides(&workbook, workbook_year, &sections, sections_year))
}

// ── Tests ──
