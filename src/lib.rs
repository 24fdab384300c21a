mod config;
mod date;
mod error;
mod paths;
mod zstd_jsonl;
mod record;
mod stats;
mod output;

mod progress;
mod concurrency;
mod util;
mod mem;
mod pipeline;

pub use crate::config::ExtractOptions;
pub use crate::date::{format_created, format_seconds, parse_bound, DateWindow};
pub use crate::error::{ConfigError, FrameError, RecordError};
pub use crate::pipeline::{DumpExtractor, FileOutcome, FileReport};

// Streaming stages, usable on any `Read` source.
pub use crate::zstd_jsonl::{open_lines, ArchiveLines, CountingReader, DecodedChunk, FrameDecoder, FrameLimits, Line, LineAssembler};

// Projection and accounting.
pub use crate::record::{parse_object, project_line, repair_lone_surrogates, ExtractedRecord, RecordKind, DELETED_AUTHOR, SITE_ORIGIN};
pub use crate::stats::{LineClass, ProcessingStats, ProgressObservation};

// Output and discovery.
pub use crate::output::{OutputFormat, RowWriter};
pub use crate::paths::{discover_archives, output_path_for};

// Expose multiprogress and memory helpers.
pub use crate::progress::set_global_multiprogress;
pub use crate::mem::available_memory_fraction;

pub use crate::util::init_tracing_once;
