use crate::enrich::{enrich_book, EnrichOptions};
use crate::error::ImportError;
use crate::identity::{book_key, short_hash};
use crate::parser::{parse_export, sort_highlights, SortMode};
use crate::render::{document_stem, render_book, render_collection, sanitize_file_stem, RenderContext};
use crate::source::SourceReader;
use crate::store::DocumentStore;
use crate::sync::{apply, SyncAction};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Target recorded for failures that are not tied to a single document.
pub const BATCH_TARGET: &str = "(batch)";

/// Everything one import run needs besides its source and store.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub enrich: EnrichOptions,
    pub sort: SortMode,
    pub one_note_per_book: bool,
    pub dry_run: bool,
    /// Date stamped into the `updated` field of rendered documents.
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
    Error,
}

impl From<SyncAction> for Outcome {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Create => Outcome::Created,
            SyncAction::Update => Outcome::Updated,
            SyncAction::Skip => Outcome::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetail {
    pub target_path: String,
    pub outcome: Outcome,
    pub reason: Option<String>,
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: Vec<ItemDetail>,
}

impl ImportSummary {
    fn record(&mut self, detail: ItemDetail) {
        match detail.outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Error => self.errors += 1,
        }
        self.details.push(detail);
    }

    fn record_error(&mut self, target_path: &str, source_path: Option<&str>, reason: String) {
        self.record(ItemDetail {
            target_path: target_path.to_string(),
            outcome: Outcome::Error,
            reason: Some(reason),
            source_path: source_path.map(String::from),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Document names handed out during one run.
///
/// The first claimant of a stem gets `<stem>.md`; later ones get the stem
/// suffixed with a hash of their own discriminator. Sources are listed in a
/// stable order, so the same book keeps the same name across runs.
#[derive(Debug, Default)]
struct TargetClaims {
    taken: HashSet<String>,
}

impl TargetClaims {
    fn claim(&mut self, stem: &str, discriminator: &str) -> Result<String, String> {
        let plain = format!("{}.md", stem);
        if self.taken.insert(plain.clone()) {
            return Ok(plain);
        }
        let suffixed = format!("{} ({}).md", stem, short_hash(discriminator));
        if self.taken.insert(suffixed.clone()) {
            Ok(suffixed)
        } else {
            Err(plain)
        }
    }
}

/// Held for the duration of a run; releases the flag on drop.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Importer {
    options: ImportOptions,
    running: AtomicBool,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Importer {
            options,
            running: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Imports every source into the store. Always returns a summary; failures
    /// are recorded in it rather than returned.
    pub fn run<S, D>(&self, source: &S, store: &mut D) -> ImportSummary
    where
        S: SourceReader + ?Sized,
        D: DocumentStore + ?Sized,
    {
        let mut summary = ImportSummary::default();

        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Import already in progress, refusing to start another");
            summary.record_error(BATCH_TARGET, None, "Import already in progress".to_string());
            return summary;
        };

        info!(kind = source.kind(), dry_run = self.options.dry_run, "Import starting");

        let sources = match source.list() {
            Ok(paths) => paths,
            Err(e) => {
                error!(error = %e, "Failed to list sources");
                summary.record_error(BATCH_TARGET, None, e.to_string());
                return summary;
            }
        };

        let mut claims = TargetClaims::default();
        for path in &sources {
            info!(source = %path, "Importing source");
            if let Err(e) = self.import_source(source, store, path, &mut claims, &mut summary) {
                error!(source = %path, error = %e, "Failed to import source");
                summary.record_error(path, Some(path), e.to_string());
            }
        }

        info!(
            sources = sources.len(),
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "Import finished"
        );

        summary
    }

    fn import_source<S, D>(
        &self,
        source: &S,
        store: &mut D,
        path: &str,
        claims: &mut TargetClaims,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError>
    where
        S: SourceReader + ?Sized,
        D: DocumentStore + ?Sized,
    {
        let content = source.read(path)?;
        let mut books = parse_export(&content, path)?;
        for book in &mut books {
            enrich_book(book, &self.options.enrich);
            sort_highlights(book, self.options.sort);
        }

        let ctx = RenderContext {
            today: self.options.today,
            import_source: source.kind(),
            src_path: path,
        };

        if self.options.one_note_per_book {
            for book in &books {
                let stem = document_stem(book);
                if book.highlights.is_empty() {
                    skip_empty(summary, format!("{}.md", stem), path);
                    continue;
                }
                let discriminator = format!("{}::{}", path, book_key(book));
                match claims.claim(&stem, &discriminator) {
                    Ok(target) => {
                        self.sync_document(store, &target, &render_book(book, &ctx), path, summary)
                    }
                    Err(target) => duplicate_target(summary, &target, path),
                }
            }
        } else {
            let label = Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string());
            let stem = sanitize_file_stem(&label);
            books.retain(|book| !book.highlights.is_empty());
            if books.is_empty() {
                skip_empty(summary, format!("{}.md", stem), path);
                return Ok(());
            }
            match claims.claim(&stem, path) {
                Ok(target) => {
                    let rendered = render_collection(&label, &books, &ctx);
                    self.sync_document(store, &target, &rendered, path, summary);
                }
                Err(target) => duplicate_target(summary, &target, path),
            }
        }

        Ok(())
    }

    fn sync_document<D: DocumentStore + ?Sized>(
        &self,
        store: &mut D,
        target: &str,
        rendered: &str,
        source_path: &str,
        summary: &mut ImportSummary,
    ) {
        match apply(store, target, rendered, self.options.dry_run) {
            Ok(action) => summary.record(ItemDetail {
                target_path: target.to_string(),
                outcome: action.into(),
                reason: match action {
                    SyncAction::Skip => Some("unchanged".to_string()),
                    _ if self.options.dry_run => Some("dry run".to_string()),
                    _ => None,
                },
                source_path: Some(source_path.to_string()),
            }),
            Err(e) => {
                error!(target_path = %target, error = %e, "Failed to sync document");
                summary.record_error(target, Some(source_path), e.to_string());
            }
        }
    }
}

fn skip_empty(summary: &mut ImportSummary, target: String, source_path: &str) {
    info!(source = %source_path, target_path = %target, "No highlights, skipping");
    summary.record(ItemDetail {
        target_path: target,
        outcome: Outcome::Skipped,
        reason: Some("no highlights".to_string()),
        source_path: Some(source_path.to_string()),
    });
}

fn duplicate_target(summary: &mut ImportSummary, target: &str, source_path: &str) {
    error!(source = %source_path, target_path = %target, "Target already written in this run");
    summary.record_error(target, Some(source_path), "duplicate target".to_string());
}
