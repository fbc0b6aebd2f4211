//! Moving a media file together with its sidecars.
//!
//! A move set is the primary file plus every file in the same directory
//! sharing its stem (`Movie.mkv`, `Movie.srt`, `Movie.nfo`, ...). The set
//! is executed primary-first as several filesystem operations. There is no
//! rollback: a failed sidecar is reported and the run carries on, and a
//! retry converges because moved files are no longer at their source.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Errors for a single file move
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Source file is missing: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to move {from} to {to}: {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One planned relocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl PlannedMove {
    /// Source and destination are the same file
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Primary file plus its sidecars, with resolved destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSet {
    pub primary: PlannedMove,
    pub sidecars: Vec<PlannedMove>,
}

impl MoveSet {
    /// Plan moving `source` to `destination`, renaming sidecars to the new
    /// stem while keeping each sidecar's own extension.
    pub async fn plan(source: &Path, destination: &Path) -> io::Result<Self> {
        Self::plan_excluding(source, destination, &HashSet::new()).await
    }

    /// Like [`MoveSet::plan`], but files in `primaries` are never taken
    /// along as sidecars. Two videos sharing a stem each move on their own.
    pub async fn plan_excluding(
        source: &Path,
        destination: &Path,
        primaries: &HashSet<PathBuf>,
    ) -> io::Result<Self> {
        let primary = PlannedMove {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
        };

        let dest_dir = destination.parent().unwrap_or(Path::new(""));
        let dest_stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut sidecars = Vec::new();
        for from in find_sidecars(source).await? {
            if primaries.contains(&from) {
                debug!(path = %from.display(), "Same-stem file is a primary of its own");
                continue;
            }
            let file_name = match from.extension() {
                Some(ext) => format!("{}.{}", dest_stem, ext.to_string_lossy()),
                None => dest_stem.clone(),
            };
            sidecars.push(PlannedMove {
                to: dest_dir.join(file_name),
                from,
            });
        }

        Ok(Self { primary, sidecars })
    }
}

/// Result of a single executed move
#[derive(Debug)]
pub struct MoveResult {
    pub planned: PlannedMove,
    pub result: Result<(), MoveError>,
}

/// Outcome of executing a move set
#[derive(Debug)]
pub struct MoveReport {
    pub primary: Result<PathBuf, MoveError>,
    pub sidecars: Vec<MoveResult>,
}

impl MoveReport {
    pub fn primary_moved(&self) -> bool {
        self.primary.is_ok()
    }

    pub fn sidecar_failures(&self) -> usize {
        self.sidecars.iter().filter(|s| s.result.is_err()).count()
    }
}

/// Executes move sets, or only reports them in dry-run mode
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveExecutor {
    dry_run: bool,
}

impl MoveExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Move `source` and its sidecars so the primary lands at `destination`
    pub async fn relocate(&self, source: &Path, destination: &Path) -> MoveReport {
        self.relocate_excluding(source, destination, &HashSet::new())
            .await
    }

    /// Relocate without carrying any of `primaries` along as sidecars
    pub async fn relocate_excluding(
        &self,
        source: &Path,
        destination: &Path,
        primaries: &HashSet<PathBuf>,
    ) -> MoveReport {
        let set = match MoveSet::plan_excluding(source, destination, primaries).await {
            Ok(set) => set,
            Err(e) => {
                let error = if e.kind() == io::ErrorKind::NotFound {
                    MoveError::SourceMissing(source.to_path_buf())
                } else {
                    MoveError::Io {
                        from: source.to_path_buf(),
                        to: destination.to_path_buf(),
                        source: e,
                    }
                };
                warn!(path = %source.display(), error = %error, "Failed to plan move");
                return MoveReport {
                    primary: Err(error),
                    sidecars: Vec::new(),
                };
            }
        };

        self.execute(set).await
    }

    /// Execute a planned set: primary first, then each sidecar independently
    pub async fn execute(&self, set: MoveSet) -> MoveReport {
        if self.dry_run {
            info!(
                path = %set.primary.from.display(),
                to = %set.primary.to.display(),
                sidecars = set.sidecars.len(),
                "Dry run: would move"
            );
            return MoveReport {
                primary: Ok(set.primary.to),
                sidecars: set
                    .sidecars
                    .into_iter()
                    .map(|planned| MoveResult {
                        planned,
                        result: Ok(()),
                    })
                    .collect(),
            };
        }

        if let Err(error) = move_file(&set.primary).await {
            warn!(path = %set.primary.from.display(), error = %error, "Primary move failed, leaving sidecars in place");
            return MoveReport {
                primary: Err(error),
                sidecars: Vec::new(),
            };
        }
        info!(path = %set.primary.from.display(), to = %set.primary.to.display(), "Moved");

        let mut sidecars = Vec::with_capacity(set.sidecars.len());
        for planned in set.sidecars {
            let result = move_file(&planned).await;
            match &result {
                Ok(()) => debug!(path = %planned.from.display(), to = %planned.to.display(), "Moved sidecar"),
                Err(error) => warn!(path = %planned.from.display(), error = %error, "Sidecar move failed"),
            }
            sidecars.push(MoveResult { planned, result });
        }

        MoveReport {
            primary: Ok(set.primary.to),
            sidecars,
        }
    }
}

/// Files next to `primary` that share its stem
pub async fn find_sidecars(primary: &Path) -> io::Result<Vec<PathBuf>> {
    // Surfaces a missing primary before scanning its directory
    fs::metadata(primary).await?;

    let Some(stem) = primary.file_stem() else {
        return Ok(Vec::new());
    };
    let dir = match primary.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut sidecars = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_name() == primary.file_name() {
            continue;
        }
        if path.file_stem() == Some(stem) && entry.file_type().await?.is_file() {
            sidecars.push(path);
        }
    }

    sidecars.sort();
    Ok(sidecars)
}

async fn move_file(planned: &PlannedMove) -> Result<(), MoveError> {
    if planned.is_noop() {
        return Ok(());
    }

    let io_err = |source| MoveError::Io {
        from: planned.from.clone(),
        to: planned.to.clone(),
        source,
    };

    if fs::try_exists(&planned.to).await.map_err(io_err)? {
        return Err(MoveError::DestinationExists(planned.to.clone()));
    }
    if !fs::try_exists(&planned.from).await.map_err(io_err)? {
        return Err(MoveError::SourceMissing(planned.from.clone()));
    }

    if let Some(parent) = planned.to.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    match fs::rename(&planned.from, &planned.to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(path = %planned.from.display(), "Rename crosses filesystems, copying");
            copy_across(planned).await.map_err(io_err)
        }
        Err(e) => Err(io_err(e)),
    }
}

/// Copy then delete. On failure the destination is removed again so a
/// later run does not stop at `DestinationExists`.
async fn copy_across(planned: &PlannedMove) -> io::Result<()> {
    if let Err(e) = fs::copy(&planned.from, &planned.to).await {
        discard_copy(&planned.to).await;
        return Err(e);
    }
    if let Err(e) = fs::remove_file(&planned.from).await {
        discard_copy(&planned.to).await;
        return Err(e);
    }
    Ok(())
}

async fn discard_copy(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial copy"),
    }
}
