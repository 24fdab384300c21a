//! Record projection: one NDJSON line in, one output row (or a classified failure) out.

use crate::date::format_created;
use crate::error::RecordError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Canonical origin prepended to permalinks.
pub const SITE_ORIGIN: &str = "https://www.reddit.com";

/// Author substituted when the record carries none.
pub const DELETED_AUTHOR: &str = "[deleted]";

const SUBMISSION_FIELDS: &[&str] = &["author", "title", "score", "created", "link", "text", "url"];
const COMMENT_FIELDS: &[&str] = &["author", "score", "created", "link", "body"];

/// Schema variant of an archive, chosen once per file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Submission,
    Comment,
}

impl RecordKind {
    /// Case-insensitive substring match on the file name; `submission` wins over `comment`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("submission") {
            Some(Self::Submission)
        } else if lower.contains("comment") {
            Some(Self::Comment)
        } else {
            None
        }
    }

    /// Output columns, in order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Submission => SUBMISSION_FIELDS,
            Self::Comment => COMMENT_FIELDS,
        }
    }

    /// Source key feeding the free-text column.
    fn text_key(self) -> &'static str {
        match self {
            Self::Submission => "selftext",
            Self::Comment => "body",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Comment => "comment",
        }
    }
}

/// A projected row plus the creation instant used for window filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub created_utc: i64,
    pub values: Vec<String>,
}

/// Parse `line` and project it onto `kind`'s columns.
pub fn project_line(line: &str, kind: RecordKind) -> Result<ExtractedRecord, RecordError> {
    let obj = parse_object(line)?;
    let created_utc = created_utc(&obj)?;
    let created = format_created(created_utc)
        .ok_or_else(|| RecordError::InvalidTimestamp(created_utc.to_string()))?;

    let values = kind
        .fields()
        .iter()
        .map(|field| match *field {
            "created" => created.clone(),
            "link" => link(&obj),
            "author" => format!("u/{}", str_or(&obj, "author", DELETED_AUTHOR)),
            "text" | "body" => str_or(&obj, kind.text_key(), "").into_owned(),
            other => str_or(&obj, other, "").into_owned(),
        })
        .collect();

    Ok(ExtractedRecord { created_utc, values })
}

/// Parse a line as a JSON object, retrying once with lone surrogate escapes replaced.
pub fn parse_object(line: &str) -> Result<Map<String, Value>, RecordError> {
    let value = match serde_json::from_str::<Value>(line) {
        Ok(v) => v,
        Err(err) => match repair_lone_surrogates(line) {
            Some(fixed) => serde_json::from_str::<Value>(&fixed).map_err(|_| RecordError::InvalidJson(err))?,
            None => return Err(RecordError::InvalidJson(err)),
        },
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(RecordError::NotAnObject),
    }
}

/// Read `created_utc` as integer seconds. Floats are truncated, numeric strings parsed.
fn created_utc(obj: &Map<String, Value>) -> Result<i64, RecordError> {
    let v = obj.get("created_utc").ok_or(RecordError::MissingTimestamp)?;
    let parsed = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.abs() < i64::MAX as f64).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RecordError::InvalidTimestamp(v.to_string()))
}

fn link(obj: &Map<String, Value>) -> String {
    if matches!(obj.get("permalink"), Some(v) if !v.is_null()) {
        return format!("{SITE_ORIGIN}{}", str_or(obj, "permalink", ""));
    }
    let link_id = str_or(obj, "link_id", "");
    let link_id: String = link_id.chars().skip(3).collect();
    format!(
        "{SITE_ORIGIN}/r/{}/comments/{}/_/{}/",
        str_or(obj, "subreddit", ""),
        link_id,
        str_or(obj, "id", ""),
    )
}

/// Stringify `obj[key]`, or `default` when absent or null.
fn str_or<'a>(obj: &'a Map<String, Value>, key: &str, default: &'a str) -> Cow<'a, str> {
    match obj.get(key) {
        None | Some(Value::Null) => Cow::Borrowed(default),
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

/// Replace `\uD800`-`\uDFFF` escapes that do not form a valid pair with `�`.
/// Returns `None` when the line has nothing to repair.
pub fn repair_lone_surrogates(line: &str) -> Option<String> {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut changed = false;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        // An escaped backslash cannot start a \u escape.
        if bytes.get(i + 1) != Some(&b'u') {
            i += 2;
            continue;
        }
        let Some(cu) = hex4(bytes, i + 2) else {
            i += 2;
            continue;
        };
        match cu {
            0xD800..=0xDBFF => {
                let low = if bytes.get(i + 6) == Some(&b'\\') && bytes.get(i + 7) == Some(&b'u') {
                    hex4(bytes, i + 8)
                } else {
                    None
                };
                if matches!(low, Some(0xDC00..=0xDFFF)) {
                    i += 12;
                } else {
                    out.push_str(&line[last..i]);
                    out.push_str("\\uFFFD");
                    changed = true;
                    i += 6;
                    last = i;
                }
            }
            0xDC00..=0xDFFF => {
                out.push_str(&line[last..i]);
                out.push_str("\\uFFFD");
                changed = true;
                i += 6;
                last = i;
            }
            _ => i += 6,
        }
    }

    if !changed {
        return None;
    }
    out.push_str(&line[last..]);
    Some(out)
}

fn hex4(bytes: &[u8], at: usize) -> Option<u32> {
    let digits = bytes.get(at..at + 4)?;
    let s = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(s, 16).ok()
}
