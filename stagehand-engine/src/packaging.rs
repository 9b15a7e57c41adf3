//! Code bundle packaging
//!
//! Each configured source directory is archived into
//! `<staging_dir>/<dir_name>.zip` with entries stored uncompressed and paths
//! relative to the directory. Entry timestamps are fixed, so an unchanged
//! source tree produces a byte-identical bundle and the same digest.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DEFAULT_STAGING_DIR: &str = ".stagehand_dependency";
pub const DEFAULT_STAGE: &str = "@my_stage";

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("source directory {0} does not exist")]
    MissingSource(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source directory {dir} would overwrite bundle {name}.zip")]
    DuplicateBundle { name: String, dir: PathBuf },

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("invalid runtime environment file {path}: {source}")]
    Environment {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Bundle name for a source directory: its last path component
fn archive_name(source: &Path) -> Result<&str, PackagingError> {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PackagingError::MissingSource(source.to_path_buf()))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PackagingError + '_ {
    move |source| PackagingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where bundles come from and where they go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingConfig {
    pub source_dirs: Vec<PathBuf>,
    pub staging_dir: PathBuf,
    /// Remote stage bundles are uploaded to, e.g. `@my_stage`
    pub stage: String,
    /// File or directory name suffixes left out of bundles
    pub exclude: Vec<String>,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            stage: DEFAULT_STAGE.to_string(),
            exclude: vec![".pyc".to_string(), "__pycache__".to_string()],
        }
    }
}

/// One archive written to the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub path: PathBuf,
    pub file_name: String,
    /// Hex-encoded SHA-256 of the archive
    pub digest: String,
    pub entries: usize,
}

pub struct Bundler {
    config: PackagingConfig,
}

impl Bundler {
    pub fn new(config: PackagingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PackagingConfig {
        &self.config
    }

    /// Archives every source directory into the staging directory
    ///
    /// # Errors
    /// Fails on the first source directory that is missing or cannot be
    /// read, or when an archive cannot be written. Two source directories
    /// with the same name are refused before anything is written.
    pub fn build(&self) -> Result<Vec<Bundle>, PackagingError> {
        let mut names = HashSet::new();
        for source in &self.config.source_dirs {
            let name = archive_name(source)?;
            if !names.insert(name) {
                return Err(PackagingError::DuplicateBundle {
                    name: name.to_string(),
                    dir: source.clone(),
                });
            }
        }

        let staging = &self.config.staging_dir;
        std::fs::create_dir_all(staging).map_err(io_error(staging))?;

        let mut bundles = Vec::with_capacity(self.config.source_dirs.len());
        for source in &self.config.source_dirs {
            let bundle = self.archive(source)?;
            tracing::info!(
                bundle = %bundle.file_name,
                entries = bundle.entries,
                sha256 = %bundle.digest,
                "Packaged bundle"
            );
            bundles.push(bundle);
        }
        Ok(bundles)
    }

    /// Every file currently in the staging directory, sorted by name
    ///
    /// Files left there by earlier deployments are included, matching what
    /// gets uploaded.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>, PackagingError> {
        let staging = &self.config.staging_dir;
        let mut files = Vec::new();
        for entry in std::fs::read_dir(staging).map_err(io_error(staging))? {
            let entry = entry.map_err(io_error(staging))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Import list for a procedure: `<stage>/<file_name>` per staged file
    pub fn imports(&self, staged: &[PathBuf]) -> Vec<String> {
        let stage = self.config.stage.trim_end_matches('/');
        staged
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .map(|name| format!("{stage}/{name}"))
            .collect()
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.config
            .exclude
            .iter()
            .any(|pattern| name.ends_with(pattern.as_str()))
    }

    fn archive(&self, source: &Path) -> Result<Bundle, PackagingError> {
        if !source.is_dir() {
            return Err(PackagingError::MissingSource(source.to_path_buf()));
        }

        let dir_name = archive_name(source)?;
        let path = self.config.staging_dir.join(format!("{dir_name}.zip"));

        let file = File::create(&path).map_err(io_error(&path))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default());
        let archive_error = |source| PackagingError::Archive {
            path: path.clone(),
            source,
        };

        let mut entries = 0;
        let walker = WalkDir::new(source)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            zip.start_file(relative, options).map_err(archive_error)?;
            let contents = std::fs::read(entry.path()).map_err(io_error(entry.path()))?;
            zip.write_all(&contents).map_err(io_error(&path))?;
            entries += 1;
        }

        let mut writer = zip.finish().map_err(archive_error)?;
        writer.flush().map_err(io_error(&path))?;
        drop(writer);

        let digest = file_digest(&path)?;
        Ok(Bundle {
            file_name: format!("{dir_name}.zip"),
            path,
            digest,
            entries,
        })
    }
}

fn file_digest(path: &Path) -> Result<String, PackagingError> {
    let bytes = std::fs::read(path).map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Default, Deserialize)]
struct RuntimeEnvironment {
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Dependency {
    Package(String),
    Pip { pip: Vec<String> },
    Other(serde_yaml::Value),
}

/// Picks the pinned runtime package from an environment file
///
/// Looks through `dependencies` (and any nested `pip` list) for the first
/// entry starting with `prefix`. Falls back to the bare prefix when the file
/// is absent or lists no match.
pub fn resolve_runtime_package(
    environment_file: Option<&Path>,
    prefix: &str,
) -> Result<String, PackagingError> {
    let Some(path) = environment_file.filter(|p| p.exists()) else {
        return Ok(prefix.to_string());
    };

    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    let environment: RuntimeEnvironment =
        serde_yaml::from_str::<Option<RuntimeEnvironment>>(&content)
            .map_err(|source| PackagingError::Environment {
                path: path.to_path_buf(),
                source,
            })?
            .unwrap_or_default();

    for dependency in &environment.dependencies {
        match dependency {
            Dependency::Package(name) if name.starts_with(prefix) => return Ok(name.clone()),
            Dependency::Pip { pip } => {
                if let Some(name) = pip.iter().find(|p| p.starts_with(prefix)) {
                    return Ok(name.clone());
                }
            }
            _ => {}
        }
    }

    Ok(prefix.to_string())
}
