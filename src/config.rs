//! Configuration for plexsort.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PLEXSORT_LIBRARY, PLEXSORT_ORPHANED, PLEXSORT_CACHE)
//! 2. Config file (`--config <path>` or .plexsort/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .plexsort/config.yaml
//! - Paths in config file are relative to the directory holding .plexsort/
//!
//! The resolved `Settings` value is handed to each component explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::adapters::RetryPolicy;
use crate::core::DiscoveryFilter;
use crate::domain::Category;

pub const DEFAULT_LIBRARY: &str = "/Volumes/HDD_RAID/Shared Media";
pub const DEFAULT_ORPHANED: &str = "/Volumes/HDD_RAID/Orphaned";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GROUPING_BATCH: usize = 500;

const CONFIG_DIR: &str = ".plexsort";
const CONFIG_FILE: &str = "config.yaml";
const CACHE_FILE: &str = "media_cache.csv";

pub const ENV_LIBRARY: &str = "PLEXSORT_LIBRARY";
pub const ENV_ORPHANED: &str = "PLEXSORT_ORPHANED";
pub const ENV_CACHE: &str = "PLEXSORT_CACHE";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_TMDB_KEY: &str = "TMDB_API_KEY";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Category labels offered to the classifier and walked by reorganize
    pub categories: Option<Vec<String>>,
    pub discovery: Option<DiscoveryConfig>,
    pub grouping: Option<GroupingConfig>,
    pub adapters: Option<AdaptersConfig>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    pub library: Option<String>,
    pub orphaned: Option<String>,
    pub cache: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub extensions: Option<Vec<String>>,
    pub hidden_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupingConfig {
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdaptersConfig {
    pub model: Option<String>,
    /// Deadline for a whole adapter call, retries included
    pub timeout_seconds: Option<u64>,
    /// Per-HTTP-request timeout
    pub request_timeout_seconds: Option<u64>,
    pub openai_base_url: Option<String>,
    pub tmdb_base_url: Option<String>,
}

/// Adapter tuning
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub model: String,
    pub deadline: Duration,
    pub request_timeout: Duration,
    pub openai_base_url: Option<String>,
    pub tmdb_base_url: Option<String>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            deadline: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
            openai_base_url: None,
            tmdb_base_url: None,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Settings {
    /// Organized library root (synthesis and reorganize target)
    pub library_root: PathBuf,
    /// Where orphaned files are discovered in rescue mode
    pub orphaned_root: PathBuf,
    pub cache_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub categories: Vec<Category>,
    pub discovery: DiscoveryFilter,
    pub grouping_batch_size: usize,
    pub adapters: AdapterSettings,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Load from an explicit file, a discovered file, or defaults,
    /// then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };

        let file = match &config_file {
            Some(path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        let default_cache = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR)
            .join(CACHE_FILE);

        let settings = Self::resolve(config_file, file, default_cache, |key| {
            std::env::var(key).ok()
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Merge a parsed config file with environment lookups
    pub fn resolve<F>(
        config_file: Option<PathBuf>,
        file: ConfigFile,
        default_cache: PathBuf,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_dir = config_file
            .as_deref()
            .map(config_base_dir)
            .map_or_else(|| absolutize(Path::new(".")), |dir| absolutize(&dir));

        // Discovered paths become cache keys, so every root must be absolute
        let pick = |env_key: &str, from_file: &Option<String>, default: PathBuf| -> PathBuf {
            if let Some(value) = env(env_key).filter(|v| !v.is_empty()) {
                absolutize(Path::new(&value))
            } else if let Some(path) = from_file {
                resolve_path(&base_dir, path)
            } else {
                default
            }
        };

        let library_root = pick(ENV_LIBRARY, &file.paths.library, PathBuf::from(DEFAULT_LIBRARY));
        let orphaned_root = pick(ENV_ORPHANED, &file.paths.orphaned, PathBuf::from(DEFAULT_ORPHANED));
        let cache_path = pick(ENV_CACHE, &file.paths.cache, default_cache);

        let categories = match file.categories {
            Some(labels) => labels
                .iter()
                .map(|label| {
                    label
                        .parse::<Category>()
                        .with_context(|| format!("Invalid category in config: {label:?}"))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Category::BUILTIN.to_vec(),
        };

        let mut discovery = DiscoveryFilter::default();
        if let Some(d) = file.discovery {
            if let Some(extensions) = d.extensions {
                discovery.extensions = extensions.into_iter().map(normalize_extension).collect();
            }
            if let Some(prefix) = d.hidden_prefix {
                discovery.hidden_prefix = prefix;
            }
        }

        let grouping_batch_size = file
            .grouping
            .and_then(|g| g.batch_size)
            .unwrap_or(DEFAULT_GROUPING_BATCH);

        let mut adapters = AdapterSettings::default();
        if let Some(a) = file.adapters {
            if let Some(model) = a.model {
                adapters.model = model;
            }
            if let Some(secs) = a.timeout_seconds {
                adapters.deadline = Duration::from_secs(secs);
            }
            if let Some(secs) = a.request_timeout_seconds {
                adapters.request_timeout = Duration::from_secs(secs);
            }
            adapters.openai_base_url = a.openai_base_url;
            adapters.tmdb_base_url = a.tmdb_base_url;
        }

        Ok(Self {
            library_root,
            orphaned_root,
            cache_path,
            config_file,
            categories,
            discovery,
            grouping_batch_size,
            adapters,
            retry: file.retry.unwrap_or_default(),
        })
    }

    /// Reject settings that would break the run's invariants
    pub fn validate(&self) -> Result<()> {
        if self.grouping_batch_size == 0 {
            bail!("grouping.batch_size must be at least 1");
        }
        if self.categories.is_empty() {
            bail!("At least one category must be configured");
        }

        // Cache keys are pre-move paths, so discovery must never see the library
        let library = normalize(&self.library_root);
        let orphaned = normalize(&self.orphaned_root);
        if library.starts_with(&orphaned) || orphaned.starts_with(&library) {
            bail!(
                "Orphaned root {} and library root {} must not overlap",
                self.orphaned_root.display(),
                self.library_root.display()
            );
        }

        Ok(())
    }

    /// Category labels as offered to the classifier
    pub fn category_labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label().to_string()).collect()
    }
}

/// API keys read from the environment
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub tmdb_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Both keys are required; report every missing one at once
    pub fn from_lookup<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai = env(ENV_OPENAI_KEY).filter(|k| !k.trim().is_empty());
        let tmdb = env(ENV_TMDB_KEY).filter(|k| !k.trim().is_empty());

        match (openai, tmdb) {
            (Some(openai_api_key), Some(tmdb_api_key)) => Ok(Self {
                openai_api_key,
                tmdb_api_key,
            }),
            (openai, tmdb) => {
                let missing: Vec<&str> = [
                    (openai.is_none(), ENV_OPENAI_KEY),
                    (tmdb.is_none(), ENV_TMDB_KEY),
                ]
                .into_iter()
                .filter_map(|(absent, key)| absent.then_some(key))
                .collect();
                bail!(
                    "API keys must be set as environment variables: {}",
                    missing.join(", ")
                )
            }
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Directory that relative config paths hang off
fn config_base_dir(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().map_or(false, |n| n == CONFIG_DIR) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Resolve a path that may be relative to the config file's base
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Anchor a relative path at the current directory
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn normalize_extension(ext: String) -> String {
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let settings =
            Settings::resolve(None, ConfigFile::default(), PathBuf::from("/c.csv"), no_env)
                .unwrap();

        assert_eq!(settings.library_root, PathBuf::from(DEFAULT_LIBRARY));
        assert_eq!(settings.orphaned_root, PathBuf::from(DEFAULT_ORPHANED));
        assert_eq!(settings.cache_path, PathBuf::from("/c.csv"));
        assert_eq!(settings.categories, Category::BUILTIN.to_vec());
        assert_eq!(settings.grouping_batch_size, 500);
        assert_eq!(settings.adapters.model, "gpt-4o-mini");
        assert!(settings.config_file.is_none());
        settings.validate().unwrap();
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".plexsort");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  library: /media/library
  orphaned: /media/orphaned
  cache: state/cache.csv
categories: ["Anime", "Movies"]
discovery:
  extensions: [mkv, ".MP4"]
grouping:
  batch_size: 50
adapters:
  model: gpt-4o
  timeout_seconds: 30
retry:
  max_attempts: 5
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
        assert_eq!(parsed.paths.library.as_deref(), Some("/media/library"));

        let settings = Settings::resolve(
            Some(config_path.clone()),
            parsed,
            PathBuf::from("/unused.csv"),
            no_env,
        )
        .unwrap();

        assert_eq!(settings.library_root, PathBuf::from("/media/library"));
        assert_eq!(settings.cache_path, temp.path().join("state/cache.csv"));
        assert_eq!(settings.categories, vec![Category::Anime, Category::Movies]);
        assert_eq!(settings.discovery.extensions, vec![".mkv", ".MP4"]);
        assert_eq!(settings.grouping_batch_size, 50);
        assert_eq!(settings.adapters.model, "gpt-4o");
        assert_eq!(settings.adapters.deadline, Duration::from_secs(30));
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_delay_ms, 1000);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            paths: PathsConfig {
                library: Some("/from/file".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [(ENV_LIBRARY, "/from/env"), (ENV_CACHE, "/tmp/c.csv")]
            .into_iter()
            .collect();

        let settings = Settings::resolve(None, file, PathBuf::from("/d.csv"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(settings.library_root, PathBuf::from("/from/env"));
        assert_eq!(settings.cache_path, PathBuf::from("/tmp/c.csv"));
    }

    #[test]
    fn test_relative_env_paths_are_absolute() {
        let env: HashMap<&str, &str> = [(ENV_ORPHANED, "rel/orphans"), (ENV_LIBRARY, "lib")]
            .into_iter()
            .collect();

        let settings = Settings::resolve(None, ConfigFile::default(), PathBuf::from("/d.csv"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        let cwd = std::env::current_dir().unwrap();
        assert!(settings.orphaned_root.is_absolute());
        assert_eq!(settings.orphaned_root, cwd.join("rel/orphans"));
        assert_eq!(settings.library_root, cwd.join("lib"));
        assert_eq!(settings.cache_path, PathBuf::from("/d.csv"));
    }

    #[test]
    fn test_overlapping_roots_rejected() {
        let mut settings =
            Settings::resolve(None, ConfigFile::default(), PathBuf::from("/c.csv"), no_env)
                .unwrap();

        settings.library_root = PathBuf::from("/media");
        settings.orphaned_root = PathBuf::from("/media/orphaned");
        assert!(settings.validate().is_err());

        settings.orphaned_root = PathBuf::from("/media");
        assert!(settings.validate().is_err());

        settings.orphaned_root = PathBuf::from("/media-orphaned");
        assert!(settings.validate().is_ok());

        settings.grouping_batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_credentials_required() {
        let err = Credentials::from_lookup(|k| (k == ENV_OPENAI_KEY).then(|| "sk".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TMDB_KEY));
        assert!(!err.to_string().contains(ENV_OPENAI_KEY));

        let creds = Credentials::from_lookup(|_| Some("key".to_string())).unwrap();
        assert_eq!(creds.tmdb_api_key, "key");
        assert!(!format!("{creds:?}").contains("key"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            config_base_dir(Path::new("/p/.plexsort/config.yaml")),
            PathBuf::from("/p")
        );
        assert_eq!(config_base_dir(Path::new("/etc/plexsort.yaml")), PathBuf::from("/etc"));
    }
}
