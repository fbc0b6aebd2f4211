//! Per-file pipeline driver.
//!
//! Files go through the pipeline one at a time:
//! cache lookup or classification, enrichment, path synthesis, move and
//! cache append. Nothing a single file does can stop the batch; only the
//! caller's setup (credentials, cache schema, lock) is fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{with_deadline, Classifier, EnrichmentQuery, Enricher, MediaKind};
use crate::domain::{FileOutcome, FileStage, MediaRecord, RunSummary};

use super::cache::CacheStore;
use super::mover::MoveExecutor;
use super::synthesizer::PathSynthesizer;

/// Rescue pipeline orchestrator
pub struct Orchestrator {
    classifier: Arc<dyn Classifier>,
    enricher: Arc<dyn Enricher>,
    synthesizer: PathSynthesizer,
    mover: MoveExecutor,
    /// Upper bound on any single adapter call
    adapter_deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        enricher: Arc<dyn Enricher>,
        synthesizer: PathSynthesizer,
        mover: MoveExecutor,
        adapter_deadline: Duration,
    ) -> Self {
        Self {
            classifier,
            enricher,
            synthesizer,
            mover,
            adapter_deadline,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.mover.is_dry_run()
    }

    /// Process every file in order, then prune the cache against `files`
    #[instrument(skip_all, fields(files = files.len(), dry_run = self.is_dry_run()))]
    pub async fn process_files(&self, files: &[PathBuf], cache: &mut CacheStore) -> RunSummary {
        let mut summary = RunSummary {
            discovered: files.len(),
            ..Default::default()
        };

        // Same-stem videos are each routed on their own, never as sidecars
        let primaries: HashSet<PathBuf> = files.iter().cloned().collect();
        for path in files {
            let outcome = self.route(path, cache, &primaries).await;
            summary.record(&outcome);
        }

        summary.pruned = cache.prune(files.iter().map(PathBuf::as_path)).len();

        info!(
            discovered = summary.discovered,
            cached = summary.cached,
            cache_hits = summary.cache_hits,
            skipped = summary.skipped,
            failed = summary.failed,
            pruned = summary.pruned,
            "Run complete"
        );
        summary
    }

    /// Drive one file to a terminal state
    pub async fn process_file(&self, path: &Path, cache: &mut CacheStore) -> FileOutcome {
        self.route(path, cache, &HashSet::new()).await
    }

    /// Same-stem files listed in `primaries` are left for their own turn
    #[instrument(skip(self, cache, primaries), fields(path = %path.display()))]
    async fn route(
        &self,
        path: &Path,
        cache: &mut CacheStore,
        primaries: &HashSet<PathBuf>,
    ) -> FileOutcome {
        info!(stage = %FileStage::Discovered, "Processing");

        let (record, from_cache) = match cache.get(path) {
            Some(cached) => {
                debug!(stage = %FileStage::CacheHit, "Using cached metadata");
                (cached.clone(), true)
            }
            None => match self.classify(path).await {
                Ok(record) => (self.enrich(record).await, false),
                Err(outcome) => return outcome,
            },
        };

        let destination = match self.synthesizer.prepare(&record, self.is_dry_run()).await {
            Ok(destination) => destination.path(),
            Err(e) => {
                warn!(stage = %FileStage::PathSynthesis, error = %e, "Cannot build destination");
                return FileOutcome::Failed {
                    stage: FileStage::PathSynthesis,
                    error: e.to_string(),
                };
            }
        };

        let report = self
            .mover
            .relocate_excluding(path, &destination, primaries)
            .await;
        let moved_to = match report.primary {
            Ok(ref to) => to.clone(),
            Err(ref e) => {
                warn!(stage = %FileStage::Moving, error = %e, "Move failed, file left in place");
                return FileOutcome::Failed {
                    stage: FileStage::Moving,
                    error: e.to_string(),
                };
            }
        };

        let sidecar_failures = report.sidecar_failures();
        if sidecar_failures > 0 {
            warn!(sidecar_failures, "Some sidecars were not moved");
        }

        if self.is_dry_run() {
            info!(to = %moved_to.display(), "Dry run: would move");
        } else if record.new_path.as_deref() != Some(moved_to.as_path()) {
            let record = MediaRecord {
                new_path: Some(moved_to.clone()),
                ..record
            };
            // The file has already moved; losing the row only costs a reclassification
            if let Err(e) = cache.append(record).await {
                error!(error = %e, "Failed to write cache entry");
            }
        }

        FileOutcome::Cached {
            destination: moved_to,
            from_cache,
            sidecar_failures,
        }
    }

    /// Ask the classifier and validate its answer
    async fn classify(&self, path: &Path) -> Result<MediaRecord, FileOutcome> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(stage = %FileStage::Classifying, classifier = self.classifier.name());
        let classification =
            match with_deadline(self.adapter_deadline, self.classifier.classify(&file_name)).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(stage = %FileStage::Classifying, error = %e, "Classification failed, skipping");
                    return Err(FileOutcome::Skipped {
                        reason: format!("classification failed: {e}"),
                    });
                }
            };

        if classification.is_empty() {
            warn!("Classifier could not identify file, skipping");
            return Err(FileOutcome::Skipped {
                reason: "not identified".to_string(),
            });
        }

        MediaRecord::from_classification(path, classification).map_err(|e| {
            warn!(stage = %FileStage::Classifying, error = %e, "Invalid classification");
            FileOutcome::Failed {
                stage: FileStage::Classifying,
                error: e.to_string(),
            }
        })
    }

    /// Corroborate title and year for non-episodic records; never fails
    async fn enrich(&self, record: MediaRecord) -> MediaRecord {
        if record.category.is_episodic() {
            return record;
        }

        let query = EnrichmentQuery {
            title: record.title.clone(),
            year: record.year.clone(),
            kind: MediaKind::from(&record.category),
        };

        debug!(stage = %FileStage::Enriching, enricher = self.enricher.name());
        match with_deadline(self.adapter_deadline, self.enricher.lookup(&query)).await {
            Ok(Some(found)) => {
                let year = found.year().map(str::to_string).or(record.year);
                debug!(title = %found.title, year = ?year, "Enriched");
                MediaRecord {
                    title: found.title,
                    year,
                    ..record
                }
            }
            Ok(None) => {
                warn!(title = %record.title, "No enrichment match");
                record
            }
            Err(e) => {
                warn!(title = %record.title, error = %e, "Enrichment failed, keeping classifier metadata");
                record
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterError, EnrichmentMatch};
    use crate::domain::{Category, Classification, Grouping};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixedClassifier(Classification);

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(&self, _file_name: &str) -> Result<Classification, AdapterError> {
            Ok(self.0.clone())
        }

        async fn group(&self, _: &Category, _: &[String]) -> Result<Vec<Grouping>, AdapterError> {
            Ok(Vec::new())
        }
    }

    struct FailingEnricher;

    #[async_trait]
    impl Enricher for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }

        async fn lookup(&self, _: &EnrichmentQuery) -> Result<Option<EnrichmentMatch>, AdapterError> {
            Err(AdapterError::Status {
                status: 500,
                body: "down".to_string(),
            })
        }
    }

    struct SlowEnricher;

    #[async_trait]
    impl Enricher for SlowEnricher {
        fn name(&self) -> &str {
            "slow"
        }

        async fn lookup(&self, _: &EnrichmentQuery) -> Result<Option<EnrichmentMatch>, AdapterError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    fn orchestrator(
        classification: Classification,
        enricher: Arc<dyn Enricher>,
        root: &Path,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(FixedClassifier(classification)),
            enricher,
            PathSynthesizer::new(root),
            MoveExecutor::new(false),
            Duration::from_millis(200),
        )
    }

    fn movie() -> Classification {
        Classification {
            category: Some("Movies".to_string()),
            title: Some("Test Movie".to_string()),
            year: Some("2020".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_enrichment_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/Test.Movie.mkv");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"x").unwrap();

        let lib = temp.path().join("lib");
        let orch = orchestrator(movie(), Arc::new(FailingEnricher), &lib);
        let mut cache = CacheStore::in_memory();

        let outcome = orch.process_file(&src, &mut cache).await;

        let expected = lib.join("Movies/2020 - Test Movie.mkv");
        assert_eq!(
            outcome,
            FileOutcome::Cached {
                destination: expected.clone(),
                from_cache: false,
                sidecar_failures: 0,
            }
        );
        assert!(expected.exists());
        assert_eq!(cache.get(&src).unwrap().new_path.as_deref(), Some(expected.as_path()));
    }

    #[tokio::test]
    async fn test_enrichment_deadline() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/Test.Movie.mkv");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"x").unwrap();

        let orch = orchestrator(movie(), Arc::new(SlowEnricher), &temp.path().join("lib"));
        let mut cache = CacheStore::in_memory();

        let outcome = orch.process_file(&src, &mut cache).await;
        assert_eq!(outcome.stage(), FileStage::Cached);
    }

    #[tokio::test]
    async fn test_unidentified_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/noise.mkv");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"x").unwrap();

        let orch = orchestrator(
            Classification::default(),
            Arc::new(FailingEnricher),
            &temp.path().join("lib"),
        );
        let mut cache = CacheStore::in_memory();

        let outcome = orch.process_file(&src, &mut cache).await;
        assert_eq!(outcome.stage(), FileStage::Skipped);
        assert!(src.exists());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_title_fails_validation() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("in/noise.mkv");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"x").unwrap();

        let classification = Classification {
            category: Some("Movies".to_string()),
            year: Some("1999".to_string()),
            ..Default::default()
        };
        let orch = orchestrator(classification, Arc::new(FailingEnricher), &temp.path().join("lib"));
        let mut cache = CacheStore::in_memory();

        let outcome = orch.process_file(&src, &mut cache).await;
        assert!(matches!(
            outcome,
            FileOutcome::Failed {
                stage: FileStage::Classifying,
                ..
            }
        ));
        assert!(src.exists());
    }
}
