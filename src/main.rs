use anyhow::Result;
use retl_dumps::{init_tracing_once, DumpExtractor, ExtractOptions, FileOutcome};
use serde_json::json;

const INPUT_ROOT: &str = "./data/subreddits";
const OUTPUT_ROOT: &str = "./data/csv";

fn main() -> Result<()> {
    init_tracing_once();

    // Positional args override the defaults; RETL_* env vars override everything.
    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| INPUT_ROOT.to_string());
    let output = args.next().unwrap_or_else(|| OUTPUT_ROOT.to_string());

    let opts = ExtractOptions::default()
        .with_input_dir(&input)
        .with_output_dir(&output)
        .with_progress(true)
        .with_env_overrides()?;

    let reports = DumpExtractor::from_options(opts).run()?;

    for r in &reports {
        match &r.outcome {
            FileOutcome::Completed { output, rows } => {
                println!("{} -> {} ({} rows, {} bad lines)", r.input.display(), output.display(), rows, r.stats.bad_lines)
            }
            FileOutcome::Aborted { error } => println!("{} aborted: {:#}", r.input.display(), error),
            FileOutcome::Skipped => println!("{} skipped: unrecognized record kind", r.input.display()),
        }
    }

    let summary: Vec<_> = reports
        .iter()
        .map(|r| json!({ "input": r.input.display().to_string(), "kind": r.kind, "stats": r.stats }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
