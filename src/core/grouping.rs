//! Reorganization of an already-categorized library into thematic groups.
//!
//! For each category directory the file stems are sent to the classifier
//! in bounded batches. Every returned grouping with a usable name moves
//! the files whose stem equals one of its titles (exact match) into
//! `root/category/group/`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::adapters::{with_deadline, Classifier};
use crate::domain::{Category, Grouping, ReorganizeSummary};

use super::discovery::DiscoveryFilter;
use super::mover::MoveExecutor;
use super::sanitize::sanitize;

pub struct GroupingEngine {
    classifier: Arc<dyn Classifier>,
    root: PathBuf,
    batch_size: usize,
    mover: MoveExecutor,
    adapter_deadline: Duration,
}

impl GroupingEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        root: impl Into<PathBuf>,
        batch_size: usize,
        mover: MoveExecutor,
        adapter_deadline: Duration,
    ) -> Self {
        Self {
            classifier,
            root: root.into(),
            batch_size: batch_size.max(1),
            mover,
            adapter_deadline,
        }
    }

    /// Regroup every category whose directory exists under the root
    #[instrument(skip_all, fields(root = %self.root.display(), dry_run = self.mover.is_dry_run()))]
    pub async fn reorganize(
        &self,
        categories: &[Category],
        filter: &DiscoveryFilter,
    ) -> ReorganizeSummary {
        info!("Starting reorganization");
        let mut summary = ReorganizeSummary::default();

        for category in categories {
            let dir = self.category_dir(category);
            if !dir.is_dir() {
                debug!(category = %category, "No directory for category");
                continue;
            }

            let files = filter.discover(&dir);
            info!(category = %category, files = files.len(), "Analyzing category");
            summary.categories += 1;
            summary.files += files.len();

            self.regroup_category(category, &files, &mut summary).await;
        }

        info!(
            categories = summary.categories,
            groupings = summary.groupings,
            moved = summary.moved,
            failed = summary.failed,
            "Reorganization complete"
        );
        summary
    }

    /// Ask for groupings over `files` and move matches into group folders
    pub async fn regroup_category(
        &self,
        category: &Category,
        files: &[PathBuf],
        summary: &mut ReorganizeSummary,
    ) {
        let groupings = self.collect_groupings(category, files).await;
        let category_dir = self.category_dir(category);
        let mut relocated: HashSet<PathBuf> = HashSet::new();

        for grouping in groupings {
            let Some(folder) = grouping.folder_name() else {
                debug!(category = %category, group = ?grouping.group_name, "Discarding unusable grouping");
                summary.discarded += 1;
                continue;
            };
            summary.groupings += 1;

            let group_dir = category_dir.join(&folder);
            for title in grouping.titles() {
                for file in files.iter().filter(|f| stem_of(f) == Some(title.as_str())) {
                    if relocated.contains(file) {
                        continue;
                    }
                    let Some(name) = file.file_name() else {
                        continue;
                    };
                    let dest = group_dir.join(name);
                    if dest == *file {
                        continue;
                    }

                    let report = self.mover.relocate(file, &dest).await;
                    match report.primary {
                        Ok(_) => {
                            summary.moved += 1;
                            relocated.insert(file.clone());
                            relocated.extend(
                                report
                                    .sidecars
                                    .iter()
                                    .filter(|s| s.result.is_ok())
                                    .map(|s| s.planned.from.clone()),
                            );
                        }
                        Err(e) => {
                            warn!(path = %file.display(), group = %folder, error = %e, "Grouping move failed");
                            summary.failed += 1;
                        }
                    }
                }
            }
        }
    }

    /// Groupings for all batches of a category, concatenated in order
    async fn collect_groupings(&self, category: &Category, files: &[PathBuf]) -> Vec<Grouping> {
        let titles: Vec<String> = files
            .iter()
            .filter_map(|f| stem_of(f).map(str::to_string))
            .collect();

        let mut groupings = Vec::new();
        for (batch, chunk) in titles.chunks(self.batch_size).enumerate() {
            match with_deadline(self.adapter_deadline, self.classifier.group(category, chunk)).await {
                Ok(found) => {
                    debug!(category = %category, batch, groupings = found.len(), "Received groupings");
                    groupings.extend(found);
                }
                Err(e) => {
                    warn!(category = %category, batch, error = %e, "Grouping request failed, skipping batch");
                }
            }
        }
        groupings
    }

    fn category_dir(&self, category: &Category) -> PathBuf {
        self.root.join(sanitize(Some(category.label())))
    }
}

fn stem_of(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use crate::domain::Classification;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records each batch it is asked about
    struct BatchRecorder {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Classifier for BatchRecorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn classify(&self, _: &str) -> Result<Classification, AdapterError> {
            Ok(Classification::default())
        }

        async fn group(&self, _: &Category, titles: &[String]) -> Result<Vec<Grouping>, AdapterError> {
            self.batches.lock().unwrap().push(titles.to_vec());
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_titles_are_batched() {
        let recorder = Arc::new(BatchRecorder {
            batches: Mutex::new(Vec::new()),
        });
        let engine = GroupingEngine::new(
            recorder.clone(),
            "/lib",
            2,
            MoveExecutor::new(true),
            Duration::from_secs(1),
        );
        let files: Vec<PathBuf> = ["a.mkv", "b.mkv", "c.mkv"]
            .iter()
            .map(|f| PathBuf::from("/lib/Movies").join(f))
            .collect();

        let mut summary = ReorganizeSummary::default();
        engine
            .regroup_category(&Category::Movies, &files, &mut summary)
            .await;

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(*batches, vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(summary.moved, 0);
    }
}
