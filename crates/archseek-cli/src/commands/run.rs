//! Run command - search a pattern list and write a run report.

use crate::app::App;
use archseek_core::load_patterns;
use std::path::PathBuf;

/// Arguments of the run command.
#[derive(Debug)]
pub struct RunArgs {
    pub archive: PathBuf,
    pub patterns: PathBuf,
    pub out: Option<PathBuf>,
    pub extract: bool,
    pub case_sensitive: bool,
    pub json: bool,
}

/// Run the run command.
pub fn run(app: App, args: RunArgs) -> anyhow::Result<()> {
    let app = app.with_case_sensitive(args.case_sensitive);

    let patterns = load_patterns(&args.patterns)?;
    app.say(format!(
        "Loaded {} unique patterns from {}",
        patterns.len(),
        args.patterns.display()
    ));

    let run_dir = app.create_run_dir(args.out.as_deref())?;
    app.say(format!("Run directory: {}", run_dir.display()));

    let session = app.open_session(&args.archive)?;
    let report = session.run(&patterns);

    let total = report.patterns.len();
    for row in &report.patterns {
        app.say(format!(
            "[{:>4}/{}] {} -> {} hits in {:.3}s",
            row.pattern_id, total, row.pattern, row.match_count, row.seconds
        ));
    }

    // Extraction runs after the timed searches
    if args.extract || app.config.extraction.enabled {
        let out_root = run_dir.join("extracted");
        std::fs::create_dir_all(&out_root)?;
        let summary = session.extract_report(&report, &out_root)?;
        app.say(format!(
            "Extracted {} files to {} ({} skipped)",
            summary.written.len(),
            out_root.display(),
            summary.skipped.len()
        ));
        for skipped in &summary.skipped {
            app.say(format!("  skipped {}: {}", skipped.name, skipped.reason));
        }
    }
    session.close();

    let written = report.write_all(
        &run_dir,
        app.config.report.write_csv,
        args.json || app.config.report.write_json,
    )?;

    app.say(report.stats_text());
    app.say("--- Output Files ---");
    for path in &written {
        app.say(format!("Wrote {}", path.display()));
    }

    Ok(())
}
