//! Stats command - show index and bucket statistics.

use crate::app::App;
use archseek_core::Bucket;
use std::path::Path;

/// Run the stats command.
pub fn run(app: App, archive: &Path) -> anyhow::Result<()> {
    let session = app.open_session(archive)?;
    let index = session.index();
    let stats = index.stats();

    println!("archseek Index Statistics");
    println!("=========================");
    println!();
    println!("Archive:     {}", session.path().display());
    println!("Format:      {}", session.format());
    println!("Case mode:   {}", session.case_mode());
    println!();

    println!("Summary:");
    println!("  Entries:        {}", stats.entries_seen);
    println!("  Regular files:  {}", stats.regular_files);
    println!("  Skipped:        {}", stats.skipped_entries);
    println!("  Directories:    {}", index.directory_count());
    println!(
        "  Build time:     {:.3}s",
        session.index_time().as_secs_f64()
    );

    if index.is_empty() {
        println!();
        println!("Archive holds no regular files.");
        session.close();
        return Ok(());
    }

    println!();
    println!("Buckets:");
    for bucket in Bucket::ALL {
        let size = stats.bucket_sizes[bucket.index()];
        println!(
            "  - {:<12}: {:>8} files ({:.2}%)",
            bucket.name(),
            size,
            size as f64 / stats.regular_files as f64 * 100.0
        );
    }

    session.close();
    Ok(())
}
