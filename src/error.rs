//! Error taxonomy for the extraction pipeline.
//!
//! `FrameError` is fatal for the current archive only. `RecordError` is a
//! per-line failure that is counted and skipped. Orchestration code wraps both
//! in `anyhow` at the file boundary.

use std::io;
use thiserror::Error;

/// Failures raised while turning the decompressed byte stream into text.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Undecodable bytes kept accumulating past the configured window.
    #[error("unable to decode frame after accumulating {accumulated} bytes (window {window} bytes)")]
    DecodeBoundExceeded { accumulated: usize, window: usize },

    /// The stream ended while a multi-byte sequence was still incomplete.
    #[error("stream ended with {pending} undecodable bytes pending")]
    TruncatedSequence { pending: usize },

    #[error("I/O error while reading archive: {0}")]
    Io(#[from] io::Error),
}

/// Why a single line could not be projected into a row.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing key `created_utc`")]
    MissingTimestamp,

    #[error("`created_utc` is not an integer timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Rejected configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("date window start {start} is after end {end}")]
    InvertedWindow { start: String, end: String },
}
