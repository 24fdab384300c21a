//! Row writer for projected records.
//!
//! Rows go to `<final>.part`; `commit` promotes it atomically, `discard` (or drop)
//! removes it. An aborted archive therefore never leaves a partial output behind.

use crate::util::{create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Header row of field names, then one row per record.
    Csv,
    /// One JSON object per line, keys in schema order.
    Jsonl,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            other => Err(format!("unknown output format {other:?} (expected csv or jsonl)")),
        }
    }
}

enum Sink {
    Csv(csv::Writer<BufWriter<File>>),
    Jsonl(BufWriter<File>),
}

pub struct RowWriter {
    part: PathBuf,
    fields: &'static [&'static str],
    sink: Option<Sink>,
    rows: u64,
}

impl RowWriter {
    /// Create `<final_path>.part` and write the CSV header when applicable.
    pub fn create(
        final_path: &Path,
        fields: &'static [&'static str],
        format: OutputFormat,
        buf_bytes: usize,
    ) -> Result<Self> {
        let part = part_path(final_path);
        let file = create_with_backoff(&part, 16, 50).with_context(|| format!("create {}", part.display()))?;
        let buffered = BufWriter::with_capacity(buf_bytes.max(8 * 1024), file);
        let sink = match format {
            OutputFormat::Csv => {
                let mut w = csv::WriterBuilder::new().from_writer(buffered);
                w.write_record(fields).with_context(|| format!("write header to {}", part.display()))?;
                Sink::Csv(w)
            }
            OutputFormat::Jsonl => Sink::Jsonl(buffered),
        };
        Ok(Self { part, fields, sink: Some(sink), rows: 0 })
    }

    pub fn write_row(&mut self, values: &[String]) -> Result<()> {
        debug_assert_eq!(values.len(), self.fields.len());
        match self.sink.as_mut() {
            Some(Sink::Csv(w)) => w.write_record(values)?,
            Some(Sink::Jsonl(w)) => {
                let obj: Map<String, Value> = self
                    .fields
                    .iter()
                    .zip(values)
                    .map(|(k, v)| ((*k).to_owned(), Value::String(v.clone())))
                    .collect();
                serde_json::to_writer(&mut *w, &obj)?;
                w.write_all(b"\n")?;
            }
            None => return Err(anyhow!("row writer for {} already closed", self.part.display())),
        }
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and atomically move the part file to `final_path`.
    /// On failure the part file is removed before the error is returned.
    pub fn commit(mut self, final_path: &Path) -> Result<()> {
        // The sink is dropped here so the handle is closed before the rename.
        let flushed = match self.sink.take() {
            Some(Sink::Csv(mut w)) => w.flush(),
            Some(Sink::Jsonl(mut w)) => w.flush(),
            None => Ok(()),
        };
        let promoted = flushed
            .with_context(|| format!("flush {}", self.part.display()))
            .and_then(|()| {
                replace_file_atomic_backoff(&self.part, final_path)
                    .with_context(|| format!("promote {} -> {}", self.part.display(), final_path.display()))
            });
        if promoted.is_err() {
            if let Err(cleanup) = remove_with_backoff(&self.part, 16, 50) {
                tracing::warn!("could not remove {}: {:#}", self.part.display(), cleanup);
            }
        }
        promoted
    }

    /// Drop buffered rows and delete the part file.
    pub fn discard(mut self) -> Result<()> {
        self.sink = None;
        remove_with_backoff(&self.part, 16, 50)
    }
}

impl Drop for RowWriter {
    fn drop(&mut self) {
        // Still holding a sink means neither commit nor discard ran.
        if self.sink.take().is_some() {
            let _ = remove_with_backoff(&self.part, 4, 10);
        }
    }
}

pub fn part_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    final_path.with_file_name(name)
}
