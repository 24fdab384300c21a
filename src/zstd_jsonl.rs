//! Streaming primitives for zstd-compressed NDJSON archives.
//!
//! The chain is pull-based and single-pass:
//! `File -> CountingReader -> zstd Decoder -> FrameDecoder -> LineAssembler`.
//! Each stage only reads from its upstream when the caller asks for the next item,
//! so memory stays bounded by one chunk, the pending-decode buffer and the
//! trailing line fragment.

use crate::error::FrameError;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::mem;
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// Read sizes and bounds for one archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLimits {
    /// Bytes requested from the decompressor per read.
    pub chunk_size: usize,
    /// Maximum undecodable bytes held while waiting for a character boundary.
    pub max_window_bytes: usize,
    /// zstd `window_log_max`; 31 lets the decoder accept the 2 GiB windows used by the dumps.
    pub window_log_max: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            chunk_size: 1 << 27,
            max_window_bytes: 1 << 30,
            window_log_max: 31,
        }
    }
}

// ----------------------------- Byte source ------------------------------------

/// A `Read` wrapper that counts compressed bytes read.
pub struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, counter: Arc::new(AtomicU64::new(0)) }
    }

    /// Shared handle to the running byte count.
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.counter.clone()
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

// ----------------------------- Frame decoder ----------------------------------

/// One successfully decoded run of text and the source position after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    pub text: String,
    pub offset: u64,
}

/// Turns a byte stream into UTF-8 text chunks.
///
/// A chunk that ends inside a multi-byte character cannot be decoded on its own.
/// Its bytes are held in `pending` and the next chunk is appended before retrying.
/// If `pending` grows past `max_window_bytes` the decoder fails with
/// [`FrameError::DecodeBoundExceeded`] and yields nothing further.
pub struct FrameDecoder<R: Read> {
    reader: R,
    chunk_size: usize,
    max_window_bytes: usize,
    pending: Vec<u8>,
    /// Source position; compressed bytes when a counter is attached, decoded bytes otherwise.
    position: Option<Arc<AtomicU64>>,
    decoded_bytes: u64,
    done: bool,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(reader: R, chunk_size: usize, max_window_bytes: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            max_window_bytes,
            pending: Vec::new(),
            position: None,
            decoded_bytes: 0,
            done: false,
        }
    }

    /// Report offsets from `counter` (e.g. compressed bytes) instead of decoded bytes.
    pub fn with_position(mut self, counter: Arc<AtomicU64>) -> Self {
        self.position = Some(counter);
        self
    }

    fn offset(&self) -> u64 {
        match &self.position {
            Some(c) => c.load(Ordering::Relaxed),
            None => self.decoded_bytes,
        }
    }

    /// Append up to `chunk_size` bytes to `pending`; 0 means end of stream.
    fn fill(&mut self) -> io::Result<usize> {
        let n = (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut self.pending)?;
        self.decoded_bytes += n as u64;
        Ok(n)
    }

    fn fail(&mut self, err: FrameError) -> Option<Result<DecodedChunk, FrameError>> {
        self.done = true;
        self.pending = Vec::new();
        Some(Err(err))
    }
}

impl<R: Read> Iterator for FrameDecoder<R> {
    type Item = Result<DecodedChunk, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let n = match self.fill() {
                Ok(n) => n,
                Err(e) => return self.fail(e.into()),
            };
            if n == 0 {
                self.done = true;
                if self.pending.is_empty() {
                    return None;
                }
                let pending = self.pending.len();
                return self.fail(FrameError::TruncatedSequence { pending });
            }

            match String::from_utf8(mem::take(&mut self.pending)) {
                Ok(text) => {
                    let offset = self.offset();
                    return Some(Ok(DecodedChunk { text, offset }));
                }
                Err(e) => {
                    self.pending = e.into_bytes();
                    if self.pending.len() > self.max_window_bytes {
                        let accumulated = self.pending.len();
                        tracing::debug!(accumulated, window = self.max_window_bytes, "decode window exceeded");
                        return self.fail(FrameError::DecodeBoundExceeded {
                            accumulated,
                            window: self.max_window_bytes,
                        });
                    }
                }
            }
        }
    }
}

// ----------------------------- Line assembler ---------------------------------

/// A complete line (without its `\n`) and the source offset after the chunk it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub offset: u64,
}

/// Splits decoded chunks on `\n`, carrying the unterminated tail across chunks.
///
/// Text after the last `\n` of the stream is never yielded; its length is
/// available from [`LineAssembler::dropped_tail_bytes`] once iteration ends.
pub struct LineAssembler<I> {
    chunks: I,
    fragment: String,
    ready: VecDeque<String>,
    offset: u64,
    dropped_tail: usize,
    finished: bool,
}

impl<I> LineAssembler<I>
where
    I: Iterator<Item = Result<DecodedChunk, FrameError>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            fragment: String::new(),
            ready: VecDeque::new(),
            offset: 0,
            dropped_tail: 0,
            finished: false,
        }
    }

    /// Bytes of unterminated text discarded at end of stream.
    pub fn dropped_tail_bytes(&self) -> usize {
        self.dropped_tail
    }

    fn absorb(&mut self, chunk: DecodedChunk) {
        self.offset = self.offset.max(chunk.offset);
        let mut buf = mem::take(&mut self.fragment);
        buf.push_str(&chunk.text);
        match buf.rfind('\n') {
            None => self.fragment = buf,
            Some(last) => {
                self.fragment = buf[last + 1..].to_owned();
                buf.truncate(last);
                self.ready.extend(buf.split('\n').map(str::to_owned));
            }
        }
    }
}

impl<I> Iterator for LineAssembler<I>
where
    I: Iterator<Item = Result<DecodedChunk, FrameError>>,
{
    type Item = Result<Line, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(text) = self.ready.pop_front() {
                return Some(Ok(Line { text, offset: self.offset }));
            }
            if self.finished {
                return None;
            }
            match self.chunks.next() {
                Some(Ok(chunk)) => self.absorb(chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    self.fragment.clear();
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if !self.fragment.is_empty() {
                        self.dropped_tail = self.fragment.len();
                        self.fragment.clear();
                    }
                }
            }
        }
    }
}

// ----------------------------- Archive entry point ----------------------------

pub type ArchiveDecoder = Decoder<'static, BufReader<CountingReader<File>>>;
pub type ArchiveLines = LineAssembler<FrameDecoder<ArchiveDecoder>>;

/// Open a `.zst` archive and return its line stream plus the compressed-bytes counter.
///
/// The file handle and decoder live inside the returned iterator and are closed
/// when it is dropped, on every exit path.
pub fn open_lines(path: &Path, limits: &FrameLimits) -> Result<(ArchiveLines, Arc<AtomicU64>)> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let counting = CountingReader::new(file);
    let counter = counting.counter();
    let mut decoder = Decoder::new(counting).with_context(|| format!("zstd decoder for {}", path.display()))?;
    decoder.window_log_max(limits.window_log_max)?;
    let frames = FrameDecoder::new(decoder, limits.chunk_size, limits.max_window_bytes)
        .with_position(counter.clone());
    Ok((LineAssembler::new(frames), counter))
}
