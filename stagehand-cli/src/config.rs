//! CLI configuration
//!
//! Paths and overrides come from the environment; project settings,
//! credentials and the data catalogue come from YAML files those paths name.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use stagehand_client::ConnectionSettings;
use stagehand_core::Namespace;
use stagehand_engine::{PackagingConfig, RegistryConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_PIPELINE: &str = "pipelines/pipeline.lua";
const DEFAULT_SETTINGS: &str = "conf/stagehand.yml";
const DEFAULT_CREDENTIALS: &str = "conf/local/credentials.yml";
const DEFAULT_PROFILE: &str = "default";
const DEFAULT_CATALOGUE: &str = "conf/data_catalogue.yml";

/// Prefix of variables forwarded to the definition's `env` module
pub const DEFINITION_VAR_PREFIX: &str = "STAGEHAND_VAR_";

/// Connection values taken from the environment, each overriding the profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub account_url: Option<String>,
    pub token: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline_path: PathBuf,
    pub settings_path: PathBuf,
    pub credentials_path: PathBuf,
    pub profile: String,
    pub catalogue_path: PathBuf,
    pub overrides: ConnectionOverrides,
    /// `STAGEHAND_VAR_<NAME>` values, keyed by lower-cased `<name>`
    pub definition_vars: BTreeMap<String, String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - STAGEHAND_PIPELINE (default: pipelines/pipeline.lua)
    /// - STAGEHAND_CONFIG (default: conf/stagehand.yml)
    /// - STAGEHAND_CREDENTIALS (default: conf/local/credentials.yml)
    /// - STAGEHAND_PROFILE (default: default)
    /// - STAGEHAND_CATALOGUE (default: conf/data_catalogue.yml)
    /// - STAGEHAND_ACCOUNT_URL, STAGEHAND_TOKEN, STAGEHAND_ROLE,
    ///   STAGEHAND_WAREHOUSE, STAGEHAND_DATABASE, STAGEHAND_SCHEMA
    /// - STAGEHAND_VAR_* (forwarded to the pipeline definition)
    pub fn from_env() -> Result<Self> {
        let vars: BTreeMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub(crate) fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self> {
        let get = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();
        let path = |name: &str, default: &str| {
            PathBuf::from(get(name).unwrap_or_else(|| default.to_string()))
        };

        let definition_vars = vars
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(DEFINITION_VAR_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_ascii_lowercase(), value.clone()))
            })
            .collect();

        Ok(Self {
            pipeline_path: path("STAGEHAND_PIPELINE", DEFAULT_PIPELINE),
            settings_path: path("STAGEHAND_CONFIG", DEFAULT_SETTINGS),
            credentials_path: path("STAGEHAND_CREDENTIALS", DEFAULT_CREDENTIALS),
            profile: get("STAGEHAND_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            catalogue_path: path("STAGEHAND_CATALOGUE", DEFAULT_CATALOGUE),
            overrides: ConnectionOverrides {
                account_url: get("STAGEHAND_ACCOUNT_URL"),
                token: get("STAGEHAND_TOKEN"),
                role: get("STAGEHAND_ROLE"),
                warehouse: get("STAGEHAND_WAREHOUSE"),
                database: get("STAGEHAND_DATABASE"),
                schema: get("STAGEHAND_SCHEMA"),
            },
            definition_vars,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.pipeline_path.is_file() {
            bail!(
                "Pipeline file {} does not exist",
                self.pipeline_path.display()
            );
        }
        if self.profile.contains(char::is_whitespace) {
            bail!("Credentials profile '{}' is not a valid name", self.profile);
        }
        Ok(())
    }
}

/// External command implementing a node function locally
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_stage() -> String {
    stagehand_engine::packaging::DEFAULT_STAGE.to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(stagehand_engine::packaging::DEFAULT_STAGING_DIR)
}

/// Project settings (`conf/stagehand.yml`)
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub source_dirs: Vec<PathBuf>,
    pub language: Option<String>,
    pub runtime_version: Option<String>,
    pub runtime_package: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    pub environment_file: Option<PathBuf>,
    pub namespace: Option<Namespace>,
    /// Function name to local command
    #[serde(default)]
    pub nodes: BTreeMap<String, CommandSpec>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let defaults = RegistryConfig::default();
        RegistryConfig {
            language: self.language.clone().unwrap_or(defaults.language),
            runtime_version: self
                .runtime_version
                .clone()
                .unwrap_or(defaults.runtime_version),
            runtime_package: self
                .runtime_package
                .clone()
                .unwrap_or(defaults.runtime_package),
            packages: self.packages.clone(),
            environment_file: self.environment_file.clone(),
            packaging: PackagingConfig {
                source_dirs: self.source_dirs.clone(),
                staging_dir: self.staging_dir.clone(),
                stage: self.stage.clone(),
                ..PackagingConfig::default()
            },
        }
    }
}

/// One credentials profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    pub account_url: Option<String>,
    pub token: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

/// Reads `profile` from the credentials file, if the file exists
pub fn load_profile(path: &Path, profile: &str) -> Result<Profile> {
    if !path.exists() {
        return Ok(Profile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    let mut profiles: BTreeMap<String, Profile> = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid credentials file {}", path.display()))?;
    profiles
        .remove(profile)
        .with_context(|| format!("Profile '{profile}' not found in {}", path.display()))
}

/// Merges a profile with environment overrides
pub fn connection_settings(
    profile: Profile,
    overrides: &ConnectionOverrides,
) -> Result<ConnectionSettings> {
    let pick = |over: &Option<String>, base: Option<String>| over.clone().or(base);

    let Some(account_url) = pick(&overrides.account_url, profile.account_url) else {
        bail!("No account URL configured (set STAGEHAND_ACCOUNT_URL or account_url)");
    };
    let Some(token) = pick(&overrides.token, profile.token) else {
        bail!("No token configured (set STAGEHAND_TOKEN or token)");
    };
    let Some(warehouse) = pick(&overrides.warehouse, profile.warehouse) else {
        bail!("No warehouse configured (set STAGEHAND_WAREHOUSE or warehouse)");
    };

    let mut settings = ConnectionSettings::new(account_url, token, warehouse);
    settings.role = pick(&overrides.role, profile.role);
    settings.database = pick(&overrides.database, profile.database);
    settings.schema = pick(&overrides.schema, profile.schema);
    Ok(settings)
}

/// Namespace for remote objects: settings first, then the connection
pub fn namespace(settings: &Settings, connection: &ConnectionSettings) -> Option<Namespace> {
    settings.namespace.clone().or_else(|| {
        match (&connection.database, &connection.schema) {
            (Some(database), Some(schema)) => Some(Namespace::new(database, schema)),
            _ => None,
        }
    })
}
