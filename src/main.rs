use koreader_import::config::Config;
use koreader_import::import::{ImportSummary, Importer, Outcome};
use koreader_import::source::LocalSource;
use koreader_import::store::{DocumentStore, FsStore, SqliteStore};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut store: Box<dyn DocumentStore> = match &config.database_path {
        Some(path) => match SqliteStore::open(Path::new(path)) {
            Ok(store) => Box::new(store),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Box::new(FsStore::new(&config.target_path)),
    };

    let source = LocalSource::new(&config.source_path);
    let importer = Importer::new(config.import_options());
    let summary = importer.run(&source, store.as_mut());

    print_summary(&summary, config.dry_run);

    if summary.has_errors() {
        std::process::exit(1);
    }
}

fn print_summary(summary: &ImportSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry run] " } else { "" };
    println!(
        "{}Created: {}, Updated: {}, Skipped: {}, Errors: {}",
        prefix, summary.created, summary.updated, summary.skipped, summary.errors
    );

    for detail in &summary.details {
        let label = match detail.outcome {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Skipped => "skipped",
            Outcome::Error => "error",
        };
        match &detail.reason {
            Some(reason) => println!("  {:<8} {} ({})", label, detail.target_path, reason),
            None => println!("  {:<8} {}", label, detail.target_path),
        }
    }
}
