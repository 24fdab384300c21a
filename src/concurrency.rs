//! Concurrency helper: limit the number of archives processed in parallel.

use rayon::prelude::*;
use std::path::PathBuf;

/// Run `f` over `files` with at most `limit` in flight; results keep input order.
/// Each file is still processed by a single thread, so per-file line order holds.
pub fn map_files_limited<T, F>(files: &[PathBuf], limit: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Sync + Fn(&PathBuf) -> T,
{
    if limit <= 1 || files.len() <= 1 {
        return files.iter().map(&f).collect();
    }
    // Own pool so `limit` bounds in-flight files, not the global rayon pool.
    match rayon::ThreadPoolBuilder::new().num_threads(limit.min(files.len())).build() {
        Ok(pool) => pool.install(|| files.par_iter().map(&f).collect()),
        Err(e) => {
            tracing::warn!("could not build a {}-thread pool ({}); processing files sequentially", limit, e);
            files.iter().map(&f).collect()
        }
    }
}
