#[path = "common/mod.rs"]
mod common;

use common::*;
use retl_dumps::{DateWindow, DumpExtractor, FileOutcome, FrameError, OutputFormat, RecordKind};
use serde_json::json;
use std::fs;

fn extractor(ws: &Workspace) -> DumpExtractor {
    DumpExtractor::new()
        .input_dir(&ws.input)
        .output_dir(&ws.output)
        .window(DateWindow::parse("2006-01-01", "2006-01-31").unwrap())
        .chunk_size(64 * 1024)
        .progress(false)
        .memory_throttle(None)
}

/// Every record inside the window becomes exactly one row, in input order.
#[test]
fn well_formed_archive_yields_one_row_per_line() {
    let ws = workspace();
    let lines: Vec<String> = (0..5).map(|i| submission(&format!("s{i}"), "bob", JAN_1_2006 + i * 60)).collect();
    write_zst_lines(&ws.input.join("programming_submissions.zst"), &lines);

    let reports = extractor(&ws).run().unwrap();
    assert_eq!(reports.len(), 1);
    let r = &reports[0];
    assert_eq!(r.kind, Some(RecordKind::Submission));
    assert_eq!(r.stats.lines_seen, 5);
    assert_eq!(r.stats.bad_lines, 0);
    assert!(r.stats.bytes_consumed > 0);

    let out = ws.output.join("programming_submissions.csv");
    match &r.outcome {
        FileOutcome::Completed { output, rows } => {
            assert_eq!(output, &out);
            assert_eq!(*rows, 5);
        }
        other => panic!("expected completion, got {other:?}"),
    }

    let (header, rows) = read_csv(&out);
    assert_eq!(header, vec!["author", "title", "score", "created", "link", "text", "url"]);
    assert_eq!(rows.len(), 5);
    assert_eq!(
        rows[1],
        vec![
            "u/bob",
            "Rust news",
            "183",
            "2006-01-01 00:01",
            "https://www.reddit.com/r/programming/comments/s1/rust_news/",
            "self text of s1",
            "http://example.com/x",
        ]
    );
    assert!(!ws.output.join("programming_submissions.csv.part").exists());
}

/// N lines with M malformed and K out of range: lines_seen == N, bad_lines == M, rows == N - M - K.
#[test]
fn malformed_and_out_of_range_lines_are_counted_separately() {
    let ws = workspace();
    let lines = vec![
        comment("c1", "alice", JAN_1_2006),
        "{not json".to_string(),
        comment("c2", "charlie", JAN_1_2006 - 1),
        json!({"id": "c3", "body": "no timestamp"}).to_string(),
        comment("c4", "dave", JAN_1_2006 + 3600),
        String::new(),
        comment("c5", "erin", 1_500_000_000),
    ];
    write_zst_lines(&ws.input.join("programming_comments.zst"), &lines);

    let reports = extractor(&ws).run().unwrap();
    let stats = &reports[0].stats;
    assert_eq!(stats.lines_seen, 7);
    assert_eq!(stats.bad_lines, 3);
    assert_eq!(stats.out_of_range, 2);
    assert_eq!(stats.accepted, 2);
    assert!(stats.is_balanced());

    let (header, rows) = read_csv(&ws.output.join("programming_comments.csv"));
    assert_eq!(header, vec!["author", "score", "created", "link", "body"]);
    let authors: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(authors, vec!["u/alice", "u/dave"]);
    assert_eq!(rows[0][3], "https://www.reddit.com/r/programming/comments/s1/_/c1/");
}

/// Progress fires every `interval` lines, counting malformed and out-of-range lines too.
#[test]
fn progress_is_observed_every_interval_lines_of_any_class() {
    let lines = vec![
        comment("c1", "alice", JAN_1_2006),
        "{not json".to_string(),
        comment("c2", "bob", JAN_1_2006 - 1),
        comment("c3", "carol", 1_500_000_000),
        String::new(),
        comment("c4", "dave", JAN_1_2006 + 60),
        "[]".to_string(),
    ];

    for (interval, expected) in [(2, 3), (3, 2), (7, 1), (8, 0), (1, 7)] {
        let ws = workspace();
        write_zst_lines(&ws.input.join("p_comments.zst"), &lines);
        let reports = extractor(&ws).progress_interval(interval).run().unwrap();
        let stats = &reports[0].stats;
        assert_eq!(stats.lines_seen, 7);
        assert_eq!(stats.progress_reports, expected, "interval {interval}");
        assert_eq!(stats.progress_reports, stats.lines_seen / interval);
    }
}

#[test]
fn window_bounds_are_inclusive() {
    let ws = workspace();
    let window = DateWindow::new(JAN_1_2006, JAN_1_2006 + 86_400).unwrap();
    let lines = vec![
        comment("before", "a", window.start - 1),
        comment("start", "a", window.start),
        comment("end", "a", window.end),
        comment("after", "a", window.end + 1),
    ];
    write_zst_lines(&ws.input.join("x_comments.zst"), &lines);

    let reports = extractor(&ws).window(window).run().unwrap();
    assert_eq!(reports[0].stats.accepted, 2);
    assert_eq!(reports[0].stats.out_of_range, 2);

    let (_, rows) = read_csv(&ws.output.join("x_comments.csv"));
    let links: Vec<&str> = rows.iter().map(|r| r[3].as_str()).collect();
    assert_eq!(
        links,
        vec![
            "https://www.reddit.com/r/programming/comments/s1/_/start/",
            "https://www.reddit.com/r/programming/comments/s1/_/end/",
        ]
    );
}

/// The last line has no trailing newline and is lost; this is the expected behavior.
#[test]
fn final_line_without_newline_is_dropped() {
    let ws = workspace();
    let body = format!(
        "{}\n{}\n{}",
        comment("c1", "a", JAN_1_2006),
        comment("c2", "b", JAN_1_2006),
        comment("c3", "c", JAN_1_2006)
    );
    write_zst_bytes(&ws.input.join("tail_comments.zst"), body.as_bytes());

    let reports = extractor(&ws).run().unwrap();
    assert_eq!(reports[0].stats.lines_seen, 2);
    let (_, rows) = read_csv(&ws.output.join("tail_comments.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "u/b");
}

/// Place a chunk boundary inside "é": a wide enough window decodes it,
/// a 1-byte window aborts the file with no output left behind.
#[test]
fn split_character_decodes_or_aborts_depending_on_window() {
    let line = json!({"created_utc": JAN_1_2006, "body": "café crème", "author": "x"}).to_string();
    let split_at = line.find('é').unwrap() + 1;

    let ok = workspace();
    write_zst_lines(&ok.input.join("fr_comments.zst"), &[line.clone(), line.clone()]);
    let reports = extractor(&ok).chunk_size(split_at).max_window_bytes(split_at * 4).run().unwrap();
    assert!(reports[0].is_completed());
    let (_, rows) = read_csv(&ok.output.join("fr_comments.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][4], "café crème");

    let bad = workspace();
    write_zst_lines(&bad.input.join("fr_comments.zst"), &[line.clone(), line]);
    let reports = extractor(&bad).chunk_size(split_at).max_window_bytes(1).run().unwrap();
    let err = reports[0].error().expect("file should abort");
    assert!(matches!(err.downcast_ref::<FrameError>(), Some(FrameError::DecodeBoundExceeded { .. })), "{err:#}");
    assert!(!bad.output.join("fr_comments.csv").exists());
    assert!(!bad.output.join("fr_comments.csv.part").exists());
}

/// A corrupt archive aborts alone; the unrecognized file is skipped; the good one completes.
#[test]
fn batch_isolates_failures_and_skips_unknown_kinds() {
    let ws = workspace();
    fs::write(ws.input.join("a_comments.zst"), b"this is not zstd\n").unwrap();
    write_zst_lines(&ws.input.join("b_misc.zst"), &[comment("c1", "a", JAN_1_2006)]);
    write_zst_lines(&ws.input.join("c_submissions.zst"), &[submission("s1", "bob", JAN_1_2006)]);
    fs::write(ws.input.join("notes.txt"), b"ignored").unwrap();

    let reports = extractor(&ws).run().unwrap();
    assert_eq!(reports.len(), 3, "only .zst files are planned");

    assert!(reports[0].error().is_some());
    assert!(!ws.output.join("a_comments.csv").exists());

    assert!(matches!(reports[1].outcome, FileOutcome::Skipped));
    assert_eq!(reports[1].kind, None);
    assert!(!ws.output.join("b_misc.csv").exists());

    assert!(reports[2].is_completed());
    assert_eq!(read_csv(&ws.output.join("c_submissions.csv")).1.len(), 1);
}

#[test]
fn empty_window_still_writes_header_only_output() {
    let ws = workspace();
    write_zst_lines(&ws.input.join("old_comments.zst"), &[comment("c1", "a", 1_000)]);

    let reports = extractor(&ws).run().unwrap();
    assert!(matches!(reports[0].outcome, FileOutcome::Completed { rows: 0, .. }));
    let (header, rows) = read_csv(&ws.output.join("old_comments.csv"));
    assert_eq!(header.len(), 5);
    assert!(rows.is_empty());
}

#[test]
fn jsonl_output_keeps_schema_order() {
    let ws = workspace();
    write_zst_lines(&ws.input.join("j_comments.zst"), &[comment("c1", "alice", JAN_1_2006)]);

    extractor(&ws).output_format(OutputFormat::Jsonl).run().unwrap();

    let text = fs::read_to_string(ws.output.join("j_comments.jsonl")).unwrap();
    let first = text.lines().next().unwrap();
    assert!(first.starts_with(r#"{"author":"u/alice","score":"2","created":"2006-01-01 00:00","link":"#), "{first}");
    let v: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(v["body"], "body of c1");
}

#[test]
fn concurrent_files_keep_report_order_and_line_order() {
    let ws = workspace();
    for n in 0..4 {
        let lines: Vec<String> = (0..50).map(|i| comment(&format!("f{n}_{i}"), "a", JAN_1_2006 + i)).collect();
        write_zst_lines(&ws.input.join(format!("f{n}_comments.zst")), &lines);
    }

    let reports = extractor(&ws).file_concurrency(3).run().unwrap();
    let names: Vec<String> = reports.iter().map(|r| r.input.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["f0_comments.zst", "f1_comments.zst", "f2_comments.zst", "f3_comments.zst"]);

    let (_, rows) = read_csv(&ws.output.join("f2_comments.csv"));
    assert_eq!(rows.len(), 50);
    assert!(rows[0][3].ends_with("/f2_0/"));
    assert!(rows[49][3].ends_with("/f2_49/"));
}

/// A promotion failure aborts the file and still removes the part file, without retrying a hopeless rename.
#[test]
fn failed_promotion_aborts_and_leaves_no_part_file() {
    let ws = workspace();
    write_zst_lines(&ws.input.join("x_comments.zst"), &[comment("c1", "a", JAN_1_2006)]);
    fs::create_dir_all(ws.output.join("x_comments.csv").join("occupied")).unwrap();

    let started = std::time::Instant::now();
    let reports = extractor(&ws).run().unwrap();

    let err = reports[0].error().expect("promotion onto a directory should abort");
    assert!(format!("{err:#}").contains("promote"), "{err:#}");
    assert_eq!(reports[0].stats.accepted, 1);
    assert!(!ws.output.join("x_comments.csv.part").exists());
    assert!(ws.output.join("x_comments.csv").is_dir());
    #[cfg(not(windows))]
    assert!(started.elapsed() < std::time::Duration::from_secs(5), "took {:?}", started.elapsed());
}

/// Files of very different sizes share a bounded pool; every report lands in input order.
#[test]
fn uneven_files_under_a_small_pool_all_complete_in_order() {
    let ws = workspace();
    let sizes = [400, 1, 3, 250, 2];
    for (n, size) in sizes.iter().enumerate() {
        let lines: Vec<String> = (0..*size).map(|i| comment(&format!("u{n}_{i}"), "a", JAN_1_2006 + i)).collect();
        write_zst_lines(&ws.input.join(format!("u{n}_comments.zst")), &lines);
    }

    let reports = extractor(&ws).file_concurrency(2).run().unwrap();
    assert_eq!(reports.len(), sizes.len());
    for (n, (report, size)) in reports.iter().zip(sizes).enumerate() {
        assert!(report.input.ends_with(format!("u{n}_comments.zst")));
        assert!(matches!(report.outcome, FileOutcome::Completed { rows, .. } if rows == size as u64));
    }
}
