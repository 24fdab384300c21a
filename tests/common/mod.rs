#![allow(dead_code)]

use serde_json::json;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Jan 2006 timestamps keep fixtures small and deterministic.
pub const JAN_1_2006: i64 = 1_136_073_600;

/// Write raw bytes as a single zstd stream.
pub fn write_zst_bytes(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap();
}

/// Write a compressed `.zst` file containing the provided lines, each `\n`-terminated.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    let mut buf = String::new();
    for l in lines {
        buf.push_str(l);
        buf.push('\n');
    }
    write_zst_bytes(path, buf.as_bytes());
}

/// Read a CSV output into (header, rows).
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut r = csv::Reader::from_path(path).unwrap();
    let header = r.headers().unwrap().iter().map(str::to_owned).collect();
    let rows = r
        .records()
        .map(|rec| rec.unwrap().iter().map(str::to_owned).collect())
        .collect();
    (header, rows)
}

pub fn submission(id: &str, author: &str, created_utc: i64) -> String {
    json!({
        "author": author, "created_utc": created_utc, "id": id,
        "permalink": format!("/r/programming/comments/{id}/rust_news/"),
        "score": 183, "selftext": format!("self text of {id}"),
        "subreddit": "programming", "title": "Rust news",
        "url": "http://example.com/x"
    })
    .to_string()
}

pub fn comment(id: &str, author: &str, created_utc: i64) -> String {
    json!({
        "author": author, "body": format!("body of {id}"), "created_utc": created_utc,
        "id": id, "link_id": "t3_s1", "parent_id": "t3_s1",
        "score": 2, "subreddit": "programming"
    })
    .to_string()
}

/// Fresh input/output dirs inside a temp dir that lives as long as the test.
pub struct Workspace {
    _tmp: tempfile::TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

pub fn workspace() -> Workspace {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    fs::create_dir_all(&input).unwrap();
    Workspace { _tmp: tmp, input, output }
}
