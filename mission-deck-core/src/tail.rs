//! Incremental tailing of a date-rotated, append-only log file.
//!
//! The gateway writes `<dir>/<prefix>-<YYYY-MM-DD>.log` (UTC date) and starts a
//! new file at each date boundary. [`LogTailer::poll`] is called on a fixed
//! interval and returns every line completed since the previous poll. Each
//! byte of the file is delivered as part of exactly one line, in file order.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// How much of one log file has been consumed.
///
/// `offset` counts bytes through the last newline handed out. Bytes after it
/// that have already been read but have no terminator yet sit in `pending`,
/// so the next read starts at `offset + pending.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCursor {
    pub path: PathBuf,
    pub offset: u64,
    pub last_known_size: u64,
    pending: Vec<u8>,
}

impl LogCursor {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            last_known_size: 0,
            pending: Vec::new(),
        }
    }

    /// Position the next read starts from.
    pub fn read_position(&self) -> u64 {
        self.offset + self.pending.len() as u64
    }

    /// Bytes read past the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Append freshly read bytes and return every completed line.
    ///
    /// Lines are returned without their terminator (`\n` or `\r\n`).
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        self.last_known_size = self.read_position();

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.offset += complete.len() as u64;

        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(decode_line)
            .collect()
    }

    /// Hand out the unterminated tail as a final line, marking it consumed.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let fragment = std::mem::take(&mut self.pending);
        self.offset += fragment.len() as u64;
        Some(decode_line(&fragment))
    }

    /// Start over at offset 0, dropping any unterminated tail.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.last_known_size = 0;
        self.pending.clear();
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Tails the current day's log file, following date rotation.
#[derive(Debug, Clone)]
pub struct LogTailer {
    dir: PathBuf,
    prefix: String,
    cursor: Option<LogCursor>,
}

impl LogTailer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            cursor: None,
        }
    }

    /// Path of the log file for a given UTC date.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.log", self.prefix, date.format("%Y-%m-%d")))
    }

    pub fn cursor(&self) -> Option<&LogCursor> {
        self.cursor.as_ref()
    }

    /// Poll today's file (UTC).
    pub fn poll(&mut self) -> Result<Vec<String>, TailError> {
        self.poll_on(Utc::now().date_naive())
    }

    /// Poll the file for `date`, returning every newly completed line.
    ///
    /// A missing file is a waiting state, not an error. Read errors leave the
    /// cursor untouched so the same range is retried on the next poll.
    pub fn poll_on(&mut self, date: NaiveDate) -> Result<Vec<String>, TailError> {
        let expected = self.path_for(date);
        let mut lines = Vec::new();

        let cursor = match self.cursor.take() {
            Some(mut cursor) if cursor.path != expected => {
                tracing::info!(
                    from = %cursor.path.display(),
                    to = %expected.display(),
                    "log rotated"
                );
                lines.extend(drain(&mut cursor));
                lines.extend(cursor.flush());
                LogCursor::new(expected)
            }
            Some(cursor) => cursor,
            None => LogCursor::new(expected),
        };
        let cursor = self.cursor.insert(cursor);

        let size = match fs::metadata(&cursor.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(lines),
            Err(source) => {
                let err = TailError::Stat {
                    path: cursor.path.clone(),
                    source,
                };
                return deliver_or_fail(lines, err);
            }
        };

        if size < cursor.read_position() {
            tracing::warn!(
                path = %cursor.path.display(),
                size,
                position = cursor.read_position(),
                "log truncated, restarting from the beginning"
            );
            cursor.rewind();
        }

        let start = cursor.read_position();
        if size > start {
            match read_range(&cursor.path, start, size) {
                Ok(bytes) => lines.extend(cursor.ingest(&bytes)),
                Err(source) => {
                    let err = TailError::Read {
                        path: cursor.path.clone(),
                        source,
                    };
                    return deliver_or_fail(lines, err);
                }
            }
        }

        Ok(lines)
    }
}

/// Read whatever the previous file gained since the last poll.
fn drain(cursor: &mut LogCursor) -> Vec<String> {
    let start = cursor.read_position();
    let size = match fs::metadata(&cursor.path) {
        Ok(meta) => meta.len(),
        Err(_) => return Vec::new(),
    };
    if size <= start {
        return Vec::new();
    }
    match read_range(&cursor.path, start, size) {
        Ok(bytes) => cursor.ingest(&bytes),
        Err(e) => {
            tracing::warn!(path = %cursor.path.display(), error = %e, "could not drain rotated log");
            Vec::new()
        }
    }
}

/// Lines flushed by a rotation are already consumed and must not be lost to
/// an error on the new file; the error repeats on the next poll anyway.
fn deliver_or_fail(lines: Vec<String>, err: TailError) -> Result<Vec<String>, TailError> {
    if lines.is_empty() {
        return Err(err);
    }
    tracing::warn!(error = %err, "deferring log read error");
    Ok(lines)
}

/// Read exactly `[start, end)` from `path`.
fn read_range(path: &Path, start: u64, end: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((end - start) as usize);
    file.take(end - start).read_to_end(&mut buf)?;
    Ok(buf)
}
