//! Data-asset catalogue
//!
//! Maps logical asset names (the strings nodes receive in `input_data` and
//! `output_data`) to where the data actually lives. Node functions consult
//! it; the compiler and trigger never do.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::CatalogueError;

fn default_file_type() -> String {
    "csv".to_string()
}

/// Catalogue entry for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub local_path: PathBuf,
    pub target_path: String,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub table_name: Option<String>,
}

/// Where a node should read or write an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Local(PathBuf),
    /// Stage path, e.g. `@my_stage/housing.csv`
    Remote(String),
}

impl AssetLocation {
    pub fn is_local(&self) -> bool {
        matches!(self, AssetLocation::Local(_))
    }
}

impl std::fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetLocation::Local(path) => write!(f, "{}", path.display()),
            AssetLocation::Remote(path) => write!(f, "{path}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataCatalogue {
    assets: BTreeMap<String, AssetSpec>,
}

impl DataCatalogue {
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogueError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn get(&self, asset: &str) -> Option<&AssetSpec> {
        self.assets.get(asset)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Resolves an asset for local or remote execution
    ///
    /// Folder assets resolve to `<path>/<asset>.<file_type>`; other assets
    /// resolve to their configured path as is.
    pub fn resolve(&self, asset: &str, is_local: bool) -> Result<AssetLocation, CatalogueError> {
        let spec = self
            .get(asset)
            .ok_or_else(|| CatalogueError::UnknownAsset(asset.to_string()))?;
        let file_name = format!("{asset}.{}", spec.file_type);

        Ok(match (is_local, spec.is_folder) {
            (true, false) => AssetLocation::Local(spec.local_path.clone()),
            (true, true) => AssetLocation::Local(spec.local_path.join(file_name)),
            (false, false) => AssetLocation::Remote(spec.target_path.clone()),
            (false, true) => AssetLocation::Remote(format!(
                "{}/{file_name}",
                spec.target_path.trim_end_matches('/')
            )),
        })
    }
}
