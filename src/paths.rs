use crate::output::OutputFormat;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `.zst` archives directly inside `dir`, sorted by path. Missing dir yields none.
pub fn discover_archives(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "input directory does not exist");
        return Vec::new();
    }
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|x| x.to_str())
                .map_or(false, |x| x.eq_ignore_ascii_case("zst"))
        })
        .collect();
    found.sort();
    found
}

/// `RS_2021-01.zst` -> `<out_dir>/RS_2021-01.csv`.
pub fn output_path_for(input: &Path, out_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    let mut name = stem;
    name.push(".");
    name.push(format.extension());
    out_dir.join(name)
}

pub fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
