//! Report Streamer (§4.7): a single background consumer owns the open
//! report file; writers submit violation batches via an unbounded
//! channel. The on-disk content is always a well-formed JSON array (R1),
//! and the configured filename may rotate on a time cadence derived from
//! the smallest token present in its `{...}` placeholder.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, Timelike};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("report path '{0}' contains a {{...}} placeholder but names no rotation token (YYYY, YY, MM, DD, HH, mm, or SS)")]
    NoRotationToken(String),
    #[error("report path '{0}' has an unterminated {{ placeholder")]
    UnterminatedPlaceholder(String),
    #[error("cannot open report file '{0}': {1}")]
    Open(String, std::io::Error),
    #[error("cannot write report file '{0}': {1}")]
    Write(String, std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

/// Ordered, longest-first so `YYYY` is translated before the `YY` it
/// contains as a substring (§4.7 "longest tokens first").
const TOKEN_ORDER: &[(&str, &str, Cadence)] = &[
    ("YYYY", "%Y", Cadence::Year),
    ("YY", "%y", Cadence::Year),
    ("MM", "%m", Cadence::Month),
    ("DD", "%d", Cadence::Day),
    ("HH", "%H", Cadence::Hour),
    ("mm", "%M", Cadence::Minute),
    ("SS", "%S", Cadence::Second),
];

#[derive(Debug, Clone)]
struct RotatingPattern {
    prefix: String,
    strftime_template: String,
    suffix: String,
    cadence: Cadence,
}

#[derive(Debug, Clone)]
enum FilePattern {
    Fixed(String),
    Rotating(RotatingPattern),
}

impl FilePattern {
    fn parse(path: &str) -> Result<Self, Error> {
        let Some(open) = path.find('{') else {
            return Ok(FilePattern::Fixed(path.to_string()));
        };
        let Some(close_rel) = path[open..].find('}') else {
            return Err(Error::UnterminatedPlaceholder(path.to_string()));
        };
        let close = open + close_rel;

        let prefix = path[..open].to_string();
        let inner = &path[open + 1..close];
        let suffix = path[close + 1..].to_string();

        // Last token matched (in the fixed scan order) wins the cadence tie-break.
        let mut cadence = None;
        for (token, _, cad) in TOKEN_ORDER {
            if inner.contains(token) {
                cadence = Some(*cad);
            }
        }
        let Some(cadence) = cadence else {
            return Err(Error::NoRotationToken(path.to_string()));
        };

        let mut template = inner.to_string();
        for (token, strftime, _) in TOKEN_ORDER {
            template = template.replace(token, strftime);
        }

        Ok(FilePattern::Rotating(RotatingPattern {
            prefix,
            strftime_template: template,
            suffix,
            cadence,
        }))
    }

    fn filename_now(&self) -> String {
        match self {
            FilePattern::Fixed(name) => name.clone(),
            FilePattern::Rotating(p) => {
                let now = Local::now();
                format!("{}{}{}", p.prefix, now.format(&p.strftime_template), p.suffix)
            }
        }
    }

    fn time_until_next_boundary(&self) -> Option<StdDuration> {
        match self {
            FilePattern::Fixed(_) => None,
            FilePattern::Rotating(p) => {
                let now = Local::now();
                let boundary = next_boundary(now, p.cadence);
                Some((boundary - now).to_std().unwrap_or(StdDuration::ZERO))
            }
        }
    }
}

fn next_boundary(now: DateTime<Local>, cadence: Cadence) -> DateTime<Local> {
    match cadence {
        Cadence::Second => now.with_nanosecond(0).unwrap() + ChronoDuration::seconds(1),
        Cadence::Minute => {
            now.with_second(0).unwrap().with_nanosecond(0).unwrap() + ChronoDuration::minutes(1)
        }
        Cadence::Hour => {
            now.with_minute(0).unwrap().with_second(0).unwrap().with_nanosecond(0).unwrap()
                + ChronoDuration::hours(1)
        }
        Cadence::Day => local_midnight(now.date_naive() + ChronoDuration::days(1)),
        Cadence::Month => {
            let (y, m) = (now.year(), now.month());
            let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
            local_midnight(NaiveDate::from_ymd_opt(ny, nm, 1).expect("valid first-of-month date"))
        }
        Cadence::Year => {
            local_midnight(NaiveDate::from_ymd_opt(now.year() + 1, 1, 1).expect("valid Jan 1"))
        }
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => Local::now(),
    }
}

use chrono::TimeZone;

/// Handle to the background report streamer. Cloning is cheap; every
/// clone shares the same writer task and in-memory violation history.
#[derive(Clone)]
pub struct ReportStreamer {
    sender: mpsc::UnboundedSender<Vec<ValidationError>>,
    violations: Arc<RwLock<Vec<ValidationError>>>,
}

impl ReportStreamer {
    /// Starts the background writer task. Fails fast (without spawning
    /// anything) if the path's placeholder names no rotation token (§6).
    pub fn start(report_path: impl Into<String>) -> Result<Self, Error> {
        let pattern = FilePattern::parse(&report_path.into())?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let violations = Arc::new(RwLock::new(Vec::new()));

        let task_violations = violations.clone();
        tokio::spawn(run_writer(pattern, receiver, task_violations));

        Ok(Self { sender, violations })
    }

    /// Submits a batch of violations to be appended to the report. A
    /// no-op for empty batches (§4.6 "non-empty cleaned error batch").
    pub fn submit(&self, batch: Vec<ValidationError>) {
        if batch.is_empty() {
            return;
        }
        // The receiver only disappears once the writer task has exited
        // after a terminal rotation failure (§4.7); dropping further
        // violations at that point is the documented behavior.
        let _ = self.sender.send(batch);
    }

    /// All violations observed since process start, regardless of
    /// rotation (§3 `StreamViolations`).
    pub fn snapshot(&self) -> Vec<ValidationError> {
        self.violations.read().expect("violations lock poisoned").clone()
    }
}

async fn run_writer(
    pattern: FilePattern,
    mut receiver: mpsc::UnboundedReceiver<Vec<ValidationError>>,
    violations: Arc<RwLock<Vec<ValidationError>>>,
) {
    let mut current_path = PathBuf::from(pattern.filename_now());
    let mut file = match open_fresh(&current_path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(path = %current_path.display(), error = %err, "report streamer failed to open initial file; terminating");
            return;
        }
    };

    loop {
        let sleep = match pattern.time_until_next_boundary() {
            Some(duration) => tokio::time::sleep(duration),
            None => tokio::time::sleep(StdDuration::from_secs(60 * 60 * 24 * 365)),
        };
        tokio::pin!(sleep);

        tokio::select! {
            biased;

            maybe_batch = receiver.recv() => {
                match maybe_batch {
                    Some(batch) => {
                        if let Err(err) = append_batch(&mut file, &current_path, &batch).await {
                            tracing::error!(path = %current_path.display(), error = %err, "failed to append violation batch");
                            continue;
                        }
                        violations.write().expect("violations lock poisoned").extend(batch);
                    }
                    None => {
                        tracing::info!("report streamer channel closed; shutting down");
                        break;
                    }
                }
            }

            _ = &mut sleep, if pattern.time_until_next_boundary().is_some() => {
                let next_path = PathBuf::from(pattern.filename_now());
                match open_fresh(&next_path).await {
                    Ok(new_file) => {
                        tracing::info!(from = %current_path.display(), to = %next_path.display(), "rotated report file");
                        file = new_file;
                        current_path = next_path;
                    }
                    Err(err) => {
                        tracing::error!(path = %next_path.display(), error = %err, "report streamer failed to open rotated file; terminating");
                        return;
                    }
                }
            }
        }
    }
}

async fn open_fresh(path: &std::path::Path) -> Result<tokio::fs::File, Error> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| Error::Open(path.display().to_string(), e))?;

    file.write_all(b"[]")
        .await
        .map_err(|e| Error::Write(path.display().to_string(), e))?;
    file.flush().await.map_err(|e| Error::Write(path.display().to_string(), e))?;

    Ok(file)
}

/// Appends `batch` to `file` while keeping it a well-formed JSON array
/// (R1): truncate the trailing `]`, insert a separating comma if the file
/// already held an element, write each violation, then close the array.
async fn append_batch(
    file: &mut tokio::fs::File,
    path: &std::path::Path,
    batch: &[ValidationError],
) -> Result<(), Error> {
    let metadata = file
        .metadata()
        .await
        .map_err(|e| Error::Write(path.display().to_string(), e))?;
    let len = metadata.len();
    let truncated_len = len.saturating_sub(1);

    file.set_len(truncated_len)
        .await
        .map_err(|e| Error::Write(path.display().to_string(), e))?;
    file.seek(std::io::SeekFrom::End(0))
        .await
        .map_err(|e| Error::Write(path.display().to_string(), e))?;

    if truncated_len > 1 {
        file.write_all(b",\n").await.map_err(|e| Error::Write(path.display().to_string(), e))?;
    }

    for (i, violation) in batch.iter().enumerate() {
        if i > 0 {
            file.write_all(b",\n").await.map_err(|e| Error::Write(path.display().to_string(), e))?;
        }
        let json = serde_json::to_vec(violation).expect("ValidationError always serializes");
        file.write_all(&json).await.map_err(|e| Error::Write(path.display().to_string(), e))?;
    }

    file.write_all(b"]").await.map_err(|e| Error::Write(path.display().to_string(), e))?;
    file.flush().await.map_err(|e| Error::Write(path.display().to_string(), e))?;

    Ok(())
}
