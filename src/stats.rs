//! Per-file line accounting and periodic progress observations.

use crate::date::{format_seconds, DateWindow};
use crate::error::RecordError;
use crate::record::ExtractedRecord;
use serde::Serialize;

/// How a single line was classified.
#[derive(Debug)]
pub enum LineClass {
    Accepted(ExtractedRecord),
    OutOfRange,
    Malformed(RecordError),
}

/// Counters for one archive. Every line lands in exactly one of
/// `accepted`, `out_of_range`, `bad_lines`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub lines_seen: u64,
    pub accepted: u64,
    pub out_of_range: u64,
    pub bad_lines: u64,
    /// `created_utc` of the most recent line that carried a valid one.
    pub last_timestamp_seen: Option<i64>,
    /// Compressed bytes consumed so far.
    pub bytes_consumed: u64,
    /// Progress observations emitted; one per `progress_interval` lines of any class.
    pub progress_reports: u64,
}

impl ProcessingStats {
    /// Apply the window to a projection result and count it.
    pub fn classify(&mut self, projected: Result<ExtractedRecord, RecordError>, window: &DateWindow) -> LineClass {
        self.lines_seen += 1;
        match projected {
            Ok(rec) => {
                self.last_timestamp_seen = Some(rec.created_utc);
                if window.contains(rec.created_utc) {
                    self.accepted += 1;
                    LineClass::Accepted(rec)
                } else {
                    self.out_of_range += 1;
                    LineClass::OutOfRange
                }
            }
            Err(e) => {
                self.bad_lines += 1;
                LineClass::Malformed(e)
            }
        }
    }

    /// Move the consumed-bytes mark forward; never backwards.
    pub fn advance_bytes(&mut self, offset: u64) {
        self.bytes_consumed = self.bytes_consumed.max(offset);
    }

    pub fn is_balanced(&self) -> bool {
        self.lines_seen == self.accepted + self.out_of_range + self.bad_lines
    }

    /// Share of `file_size` consumed, in percent.
    pub fn percent_of(&self, file_size: u64) -> f64 {
        if file_size == 0 {
            return 100.0;
        }
        (self.bytes_consumed as f64 / file_size as f64 * 100.0).min(100.0)
    }

    /// Count a progress observation when `lines_seen` lands on a multiple of `interval`.
    pub fn progress_due(&mut self, interval: u64, file_size: u64) -> Option<ProgressObservation> {
        if self.lines_seen == 0 || self.lines_seen % interval.max(1) != 0 {
            return None;
        }
        self.progress_reports += 1;
        Some(self.observe(file_size))
    }

    pub fn observe(&self, file_size: u64) -> ProgressObservation {
        ProgressObservation {
            last_timestamp: self.last_timestamp_seen.map(format_seconds).unwrap_or_default(),
            lines_seen: self.lines_seen,
            bad_lines: self.bad_lines,
            percent: self.percent_of(file_size),
        }
    }
}

/// Snapshot emitted every `progress_interval` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressObservation {
    pub last_timestamp: String,
    pub lines_seen: u64,
    pub bad_lines: u64,
    pub percent: f64,
}

impl ProgressObservation {
    pub fn log(&self, file: &str) {
        tracing::info!(
            file,
            "{} : {} lines processed : {} bad lines : {:.0}% done",
            self.last_timestamp,
            self.lines_seen,
            self.bad_lines,
            self.percent
        );
    }
}
