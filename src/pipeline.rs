use crate::concurrency::map_files_limited;
use crate::config::ExtractOptions;
use crate::date::DateWindow;
use crate::mem::throttle_if_low;
use crate::output::{OutputFormat, RowWriter};
use crate::paths::{discover_archives, file_name_lossy, output_path_for};
use crate::progress::archive_bar;
use crate::record::{project_line, RecordKind};
use crate::stats::{LineClass, ProcessingStats};
use crate::util::init_tracing_once;
use crate::zstd_jsonl::{open_lines, ArchiveLines};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

/// Converts a directory of zstd NDJSON archives into one row file per archive.
#[derive(Clone, Debug, Default)]
pub struct DumpExtractor {
    pub(crate) opts: ExtractOptions,
}

/// Terminal state of one archive.
#[derive(Debug)]
pub enum FileOutcome {
    /// Source exhausted; output promoted to `output`.
    Completed { output: PathBuf, rows: u64 },
    /// Fatal decode or I/O failure; no output file is left behind.
    Aborted { error: anyhow::Error },
    /// File name matched neither record kind.
    Skipped,
}

#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub kind: Option<RecordKind>,
    pub stats: ProcessingStats,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Completed { .. })
    }
    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.outcome {
            FileOutcome::Aborted { error } => Some(error),
            _ => None,
        }
    }
}

impl DumpExtractor {
    pub fn new() -> Self {
        Self { opts: ExtractOptions::default() }
    }

    pub fn from_options(opts: ExtractOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input_dir(dir); self }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn window(mut self, window: DateWindow) -> Self { self.opts = self.opts.with_window(window); self }
    pub fn chunk_size(mut self, bytes: usize) -> Self { self.opts = self.opts.with_chunk_size(bytes); self }
    pub fn max_window_bytes(mut self, bytes: usize) -> Self { self.opts = self.opts.with_max_window_bytes(bytes); self }
    pub fn progress_interval(mut self, lines: u64) -> Self { self.opts = self.opts.with_progress_interval(lines); self }
    pub fn output_format(mut self, format: OutputFormat) -> Self { self.opts = self.opts.with_output_format(format); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn memory_throttle(mut self, threshold: Option<f64>) -> Self { self.opts = self.opts.with_memory_throttle(threshold); self }

    /// Process every `.zst` archive in the input directory.
    /// Per-file failures are reported, never propagated; only setup errors return `Err`.
    pub fn run(&self) -> Result<Vec<FileReport>> {
        init_tracing_once();
        fs::create_dir_all(&self.opts.output_dir)
            .with_context(|| format!("create output dir {}", self.opts.output_dir.display()))?;

        let files = discover_archives(&self.opts.input_dir);
        if files.is_empty() {
            tracing::warn!(dir = %self.opts.input_dir.display(), "No .zst archives found. Nothing to extract.");
        } else {
            tracing::info!("Planned {} archives for window {}.", files.len(), self.opts.window);
        }

        let reports = self.run_files(&files);
        let completed = reports.iter().filter(|r| r.is_completed()).count();
        let aborted = reports.iter().filter(|r| r.error().is_some()).count();
        let skipped = reports.iter().filter(|r| matches!(r.outcome, FileOutcome::Skipped)).count();
        tracing::info!(completed, aborted, skipped, "batch finished");
        Ok(reports)
    }

    /// Process `files` in order (or `file_concurrency` at a time); reports keep input order.
    pub fn run_files(&self, files: &[PathBuf]) -> Vec<FileReport> {
        map_files_limited(files, self.opts.file_concurrency, |p| self.process_file(p))
    }

    /// Open -> Streaming -> {Completed | Aborted}; a summary is logged on both exits.
    pub fn process_file(&self, path: &Path) -> FileReport {
        let name = file_name_lossy(path);
        tracing::info!("Processing file: {}", path.display());

        let Some(kind) = RecordKind::from_file_name(&name) else {
            tracing::warn!("Unable to determine record kind for file {}, skipping.", name);
            return FileReport { input: path.to_path_buf(), kind: None, stats: ProcessingStats::default(), outcome: FileOutcome::Skipped };
        };

        let out_path = output_path_for(path, &self.opts.output_dir, self.opts.output_format);
        tracing::info!(kind = kind.as_str(), "Output will be saved to: {}", out_path.display());

        let mut stats = ProcessingStats::default();
        let outcome = match self.extract_archive(path, &name, kind, &out_path, &mut stats) {
            Ok(rows) => {
                if rows == 0 {
                    tracing::warn!(
                        "No rows for {} within {}: {} lines out of range, {} bad lines.",
                        name, self.opts.window, stats.out_of_range, stats.bad_lines
                    );
                }
                FileOutcome::Completed { output: out_path, rows }
            }
            Err(error) => {
                tracing::error!("Error processing file {}: {:#}", path.display(), error);
                FileOutcome::Aborted { error }
            }
        };

        tracing::info!(
            "Completed: {} lines processed with {} bad lines for file {}",
            stats.lines_seen, stats.bad_lines, path.display()
        );
        FileReport { input: path.to_path_buf(), kind: Some(kind), stats, outcome }
    }

    fn extract_archive(
        &self,
        path: &Path,
        name: &str,
        kind: RecordKind,
        out_path: &Path,
        stats: &mut ProcessingStats,
    ) -> Result<u64> {
        let file_size = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?.len();
        let (mut lines, counter) = open_lines(path, &self.opts.limits)?;
        let mut writer = RowWriter::create(out_path, kind.fields(), self.opts.output_format, self.opts.write_buffer_bytes)?;
        let pb = self.opts.progress.then(|| archive_bar(file_size, name));

        let drained = self.drain(&mut lines, &mut writer, name, kind, file_size, stats, pb.as_ref());
        stats.advance_bytes(counter.load(Ordering::Relaxed));
        if let Some(pb) = &pb {
            pb.finish_with_message(format!("{name} done"));
        }

        match drained {
            Ok(()) => {
                let rows = writer.rows();
                writer.commit(out_path)?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(cleanup) = writer.discard() {
                    tracing::warn!("could not remove partial output for {}: {:#}", name, cleanup);
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn drain(
        &self,
        lines: &mut ArchiveLines,
        writer: &mut RowWriter,
        name: &str,
        kind: RecordKind,
        file_size: u64,
        stats: &mut ProcessingStats,
        pb: Option<&ProgressBar>,
    ) -> Result<()> {
        let window = self.opts.window;
        let interval = self.opts.progress_interval.max(1);

        for item in lines.by_ref() {
            let line = item.with_context(|| format!("decode {name}"))?;
            stats.advance_bytes(line.offset);
            if let Some(pb) = pb {
                pb.set_position(stats.bytes_consumed);
            }

            match stats.classify(project_line(&line.text, kind), &window) {
                LineClass::Accepted(rec) => writer.write_row(&rec.values)?,
                LineClass::OutOfRange => {}
                LineClass::Malformed(e) => {
                    tracing::debug!("Bad line {} in {}: {}", stats.lines_seen, name, e);
                }
            }

            if let Some(obs) = stats.progress_due(interval, file_size) {
                obs.log(name);
            }
            throttle_if_low(self.opts.memory_throttle);
        }

        if lines.dropped_tail_bytes() > 0 {
            tracing::debug!(
                "{}: dropped {} bytes of unterminated trailing text",
                name,
                lines.dropped_tail_bytes()
            );
        }
        Ok(())
    }
}
