//! Command-line interface for plexsort.
//!
//! Exactly one mode must be selected: `--rescue` routes orphaned files into
//! the library, `--reorganize` regroups what is already there.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};

use crate::adapters::{Classifier, Enricher, OpenAiClassifier, TmdbEnricher};
use crate::config::{Credentials, Settings};
use crate::core::{
    CacheStore, GroupingEngine, MoveExecutor, Orchestrator, PathSynthesizer, RunLock,
};
use crate::domain::{ReorganizeSummary, RunSummary};

/// plexsort - Organize media files for a Plex library
#[derive(Parser, Debug)]
#[command(name = "plexsort")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["rescue", "reorganize"])))]
pub struct Cli {
    /// Classify orphaned files and move them into the library
    #[arg(long)]
    pub rescue: bool,

    /// Regroup the existing library into thematic collections
    #[arg(long)]
    pub reorganize: bool,

    /// Report what would happen without modifying files
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore the cache; every file is classified again
    #[arg(long)]
    pub no_cache: bool,

    /// Rewrite the cache without pruned rows after the run
    #[arg(long)]
    pub compact_cache: bool,

    /// Config file (defaults to .plexsort/config.yaml in this or a parent directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Selected run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rescue,
    Reorganize,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.rescue {
            Mode::Rescue
        } else {
            Mode::Reorganize
        }
    }

    /// Execute the selected mode
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;
        let credentials = Credentials::from_env()?;

        let lock = RunLock::acquire(RunLock::path_for(&settings.cache_path))?;
        info!(lock = %lock.path().display(), mode = ?self.mode(), dry_run = self.dry_run, "Lock acquired");

        let classifier = build_classifier(&settings, &credentials)?;

        match self.mode() {
            Mode::Rescue => {
                let enricher = build_enricher(&settings, &credentials)?;
                self.rescue(&settings, classifier, enricher).await
            }
            Mode::Reorganize => self.reorganize(&settings, classifier).await,
        }
    }

    async fn rescue(
        &self,
        settings: &Settings,
        classifier: Arc<dyn Classifier>,
        enricher: Arc<dyn Enricher>,
    ) -> Result<()> {
        let files = settings.discovery.discover(&settings.orphaned_root);
        if files.is_empty() {
            info!(root = %settings.orphaned_root.display(), "No media files found");
            return Ok(());
        }
        info!(files = files.len(), "Discovered media files");

        let mut cache = if self.no_cache {
            CacheStore::in_memory()
        } else {
            CacheStore::load(settings.cache_path.clone())
                .await
                .with_context(|| {
                    format!("Failed to load cache: {}", settings.cache_path.display())
                })?
        };

        let orchestrator = Orchestrator::new(
            classifier,
            enricher,
            PathSynthesizer::new(&settings.library_root),
            MoveExecutor::new(self.dry_run),
            settings.adapters.deadline,
        );
        let summary = orchestrator.process_files(&files, &mut cache).await;

        if self.compact_cache {
            if self.dry_run || self.no_cache {
                warn!("Skipping cache compaction in dry-run or no-cache mode");
            } else {
                cache
                    .compact()
                    .await
                    .with_context(|| {
                        format!("Failed to compact cache: {}", settings.cache_path.display())
                    })?;
                info!(entries = cache.len(), "Cache compacted");
            }
        }

        print_run_summary(&summary, self.dry_run);
        Ok(())
    }

    async fn reorganize(&self, settings: &Settings, classifier: Arc<dyn Classifier>) -> Result<()> {
        let engine = GroupingEngine::new(
            classifier,
            &settings.library_root,
            settings.grouping_batch_size,
            MoveExecutor::new(self.dry_run),
            settings.adapters.deadline,
        );
        let summary = engine
            .reorganize(&settings.categories, &settings.discovery)
            .await;

        print_reorganize_summary(&summary, self.dry_run);
        Ok(())
    }
}

fn build_classifier(settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn Classifier>> {
    let mut classifier = OpenAiClassifier::new(
        credentials.openai_api_key.clone(),
        settings.adapters.model.clone(),
        settings.category_labels(),
        settings.adapters.request_timeout,
    )
    .context("Failed to build classification client")?
    .with_retry(settings.retry.clone());

    if let Some(url) = &settings.adapters.openai_base_url {
        classifier = classifier.with_base_url(url.clone());
    }
    Ok(Arc::new(classifier))
}

fn build_enricher(settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn Enricher>> {
    let mut enricher = TmdbEnricher::new(
        credentials.tmdb_api_key.clone(),
        settings.adapters.request_timeout,
    )
    .context("Failed to build enrichment client")?
    .with_retry(settings.retry.clone());

    if let Some(url) = &settings.adapters.tmdb_base_url {
        enricher = enricher.with_base_url(url.clone());
    }
    Ok(Arc::new(enricher))
}

fn print_run_summary(summary: &RunSummary, dry_run: bool) {
    println!();
    println!("Rescue{}:", if dry_run { " (dry run)" } else { "" });
    println!("  Discovered:       {}", summary.discovered);
    println!("  Routed:           {}", summary.cached);
    println!("    from cache:     {}", summary.cache_hits);
    println!("  Skipped:          {}", summary.skipped);
    println!("  Failed:           {}", summary.failed);
    if summary.sidecar_failures > 0 {
        println!("  Sidecar failures: {}", summary.sidecar_failures);
    }
    println!("  Pruned from cache: {}", summary.pruned);
}

fn print_reorganize_summary(summary: &ReorganizeSummary, dry_run: bool) {
    println!();
    println!("Reorganize{}:", if dry_run { " (dry run)" } else { "" });
    println!("  Categories: {}", summary.categories);
    println!("  Files:      {}", summary.files);
    println!("  Groupings:  {} ({} discarded)", summary.groupings, summary.discarded);
    println!("  Moved:      {}", summary.moved);
    println!("  Failed:     {}", summary.failed);
}
