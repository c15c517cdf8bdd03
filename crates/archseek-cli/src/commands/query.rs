//! Query command - search patterns and print the hits.

use crate::app::App;
use crate::OutputFormat;
use archseek_core::patterns::ordered_dedupe;
use std::path::Path;
use std::time::Instant;

/// Run the query command.
pub fn run(
    app: App,
    archive: &Path,
    patterns: &[String],
    case_sensitive: bool,
    explain: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = app.with_case_sensitive(case_sensitive);
    let session = app.open_session(archive)?;
    let patterns = ordered_dedupe(patterns.iter().cloned());

    match output {
        OutputFormat::Text => {
            for pattern in &patterns {
                let start = Instant::now();
                let hits = session.search(pattern);
                let elapsed = start.elapsed();

                println!("# {}", pattern);
                if explain {
                    println!("#   route: {}", serde_json::to_string(&session.engine().route(pattern))?);
                }
                for path in hits.iter() {
                    println!("{}", path);
                }
                if !app.quiet {
                    eprintln!(
                        "Found {} results in {:.3}ms",
                        hits.len(),
                        elapsed.as_secs_f64() * 1000.0
                    );
                }
            }
        }
        OutputFormat::Json => {
            let results: Vec<serde_json::Value> = patterns
                .iter()
                .map(|pattern| {
                    let start = Instant::now();
                    let hits = session.search(pattern);
                    let mut value = serde_json::json!({
                        "pattern": pattern,
                        "bucket": session.engine().bucket_for(pattern),
                        "seconds": start.elapsed().as_secs_f64(),
                        "matches": &*hits,
                    });
                    if explain {
                        value["route"] = serde_json::json!(session.engine().route(pattern));
                    }
                    value
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    session.close();
    Ok(())
}
