use crate::date::{parse_bound, DateWindow};
use crate::error::ConfigError;
use crate::output::OutputFormat;
use crate::zstd_jsonl::FrameLimits;
use std::path::{Path, PathBuf};

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub window: DateWindow,           // inclusive, UTC epoch seconds
    pub limits: FrameLimits,          // chunk size, decode window, zstd window_log_max
    pub progress_interval: u64,       // log a progress line every N lines
    pub output_format: OutputFormat,
    pub file_concurrency: usize,      // archives processed at once; 1 = strictly sequential
    pub progress: bool,               // show a byte progress bar per archive
    pub memory_throttle: Option<f64>, // back off when available RAM fraction drops below this
    pub write_buffer_bytes: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./data"),
            output_dir: PathBuf::from("./out"),
            window: DateWindow::default(),
            limits: FrameLimits::default(),
            progress_interval: 100_000,
            output_format: OutputFormat::Csv,
            file_concurrency: 1, // each decoder can hold a 2 GiB window
            progress: false,
            memory_throttle: Some(0.10),
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ExtractOptions {
    pub fn with_input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.input_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.limits.chunk_size = bytes.max(1);
        self
    }
    pub fn with_max_window_bytes(mut self, bytes: usize) -> Self {
        self.limits.max_window_bytes = bytes;
        self
    }
    pub fn with_window_log_max(mut self, log: u32) -> Self {
        self.limits.window_log_max = log;
        self
    }
    pub fn with_progress_interval(mut self, lines: u64) -> Self {
        self.progress_interval = lines.max(1);
        self
    }
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_memory_throttle(mut self, threshold: Option<f64>) -> Self {
        self.memory_throttle = threshold.map(|t| t.clamp(0.0, 1.0));
        self
    }
    pub fn with_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    /// Apply `RETL_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unset keys keep their current value.
    ///
    /// Keys: `RETL_INPUT_DIR`, `RETL_OUTPUT_DIR`, `RETL_START`, `RETL_END`,
    /// `RETL_CHUNK_BYTES`, `RETL_MAX_WINDOW_BYTES`, `RETL_PROGRESS_EVERY`,
    /// `RETL_FORMAT`, `RETL_FILE_CONCURRENCY`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RETL_INPUT_DIR") {
            self = self.with_input_dir(v.trim());
        }
        if let Some(v) = get("RETL_OUTPUT_DIR") {
            self = self.with_output_dir(v.trim());
        }

        let start = match get("RETL_START") {
            Some(v) => parse_bound(&v, false)?,
            None => self.window.start,
        };
        let end = match get("RETL_END") {
            Some(v) => parse_bound(&v, true)?,
            None => self.window.end,
        };
        self.window = DateWindow::new(start, end)?;

        if let Some(v) = get("RETL_CHUNK_BYTES") {
            self = self.with_chunk_size(parse_positive("RETL_CHUNK_BYTES", &v)?);
        }
        if let Some(v) = get("RETL_MAX_WINDOW_BYTES") {
            self = self.with_max_window_bytes(parse_positive("RETL_MAX_WINDOW_BYTES", &v)?);
        }
        if let Some(v) = get("RETL_PROGRESS_EVERY") {
            self = self.with_progress_interval(parse_positive("RETL_PROGRESS_EVERY", &v)? as u64);
        }
        if let Some(v) = get("RETL_FORMAT") {
            let format = v.parse::<OutputFormat>().map_err(|reason| ConfigError::InvalidValue { key: "RETL_FORMAT".into(), reason })?;
            self = self.with_output_format(format);
        }
        if let Some(v) = get("RETL_FILE_CONCURRENCY") {
            self = self.with_file_concurrency(parse_positive("RETL_FILE_CONCURRENCY", &v)?);
        }
        Ok(self)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().replace('_', "").parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            reason: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}
