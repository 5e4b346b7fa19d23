//! Configuration for bookshelf paths and limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BOOKSHELF_HOME, BOOKSHELF_LIBRARIES, BOOKSHELF_EXPORTS)
//! 2. Config file (.bookshelf/config.yaml)
//! 3. Defaults (~/.bookshelf, libraries under it, exports to the current directory)
//!
//! Config file discovery:
//! - Searches current directory and parents for .bookshelf/config.yaml
//! - `home` is relative to the .bookshelf/ directory, other paths to the
//!   project root (the parent of .bookshelf/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::images::{ImageLimits, DEFAULT_MAX_IMAGE_BYTES};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const ENV_HOME: &str = "BOOKSHELF_HOME";
const ENV_LIBRARIES: &str = "BOOKSHELF_LIBRARIES";
const ENV_EXPORTS: &str = "BOOKSHELF_EXPORTS";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub images: Option<ImagesConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .bookshelf/)
    pub home: Option<String>,
    /// Directory holding one JSON file per library
    pub libraries: Option<String>,
    /// Default destination for exports
    pub exports: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    pub max_image_bytes: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory (remembers the current library)
    pub home: PathBuf,
    /// Library storage directory
    pub libraries: PathBuf,
    /// Export destination
    pub exports: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Image limits
    pub images: ImageLimits,
}

impl ResolvedConfig {
    /// File remembering the CLI's current library
    pub fn current_library_file(&self) -> PathBuf {
        self.home.join("current")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".bookshelf").join("config.yaml");
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

/// Resolve a path that may be relative to the config file's parent
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

/// Combine config file values, environment and defaults
fn resolve(
    config: Option<(&Path, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
    cwd: PathBuf,
) -> ResolvedConfig {
    let (config_path, file) = match config {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };

    // .bookshelf/ and the project root containing it
    let state_dir = config_path.and_then(Path::parent).unwrap_or(Path::new("."));
    let base_dir = state_dir.parent().unwrap_or(Path::new("."));
    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = env(ENV_HOME)
        .map(PathBuf::from)
        .or_else(|| paths.home.as_deref().map(|p| resolve_path(state_dir, p)))
        .unwrap_or(default_home);

    let libraries = env(ENV_LIBRARIES)
        .map(PathBuf::from)
        .or_else(|| paths.libraries.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("libraries"));

    let exports = env(ENV_EXPORTS)
        .map(PathBuf::from)
        .or_else(|| paths.exports.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or(cwd);

    let max_image_bytes = file
        .as_ref()
        .and_then(|f| f.images.as_ref())
        .and_then(|i| i.max_image_bytes)
        .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);

    ResolvedConfig {
        home,
        libraries,
        exports,
        config_file: config_path.map(Path::to_path_buf),
        images: ImageLimits { max_image_bytes },
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".bookshelf");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let config_file = find_config_file();
    let config = match config_file {
        Some(ref path) => Some((path.as_path(), load_config_file(path)?)),
        None => None,
    };

    Ok(resolve(config, |key| std::env::var(key).ok(), default_home, cwd))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the library storage directory
pub fn libraries_dir() -> Result<PathBuf> {
    Ok(config()?.libraries.clone())
}

/// Get the export directory
pub fn exports_dir() -> Result<PathBuf> {
    Ok(config()?.exports.clone())
}

/// Get the configured image limits
pub fn image_limits() -> Result<ImageLimits> {
    Ok(config()?.images)
}
