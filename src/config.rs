use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifact::{ArtifactDescriptor, ArtifactId, SizeClass};
use crate::catalog::{self, ArtifactCatalog, DistributionSets};
use crate::dispatch::DEFAULT_DESTINATION_PREFIX;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Root under which installed artifacts live as `<namespace>/<leaf>`.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Where the download queue stores finished transfers.
    /// Defaults to `<local_root>/downloads`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    #[serde(default = "default_destination_prefix")]
    pub destination_prefix: String,
    #[serde(default)]
    pub connectivity: ConnectivityMode,
    /// How often held transfers re-check the network, e.g. "5s".
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    /// Base install set. Omitted means the built-in set.
    #[serde(default)]
    pub base: Option<Vec<ArtifactEntry>>,
    /// Per-distribution sets. Omitted means the built-in sets.
    #[serde(default)]
    pub distributions: Option<BTreeMap<String, Vec<ArtifactEntry>>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMode {
    /// Read the active network from the system.
    #[default]
    Auto,
    Metered,
    Unmetered,
}

/// One catalog entry as written in a config file.
///
/// ```yaml
/// - id: "debian:rootfs.tar.gz"
///   source: "https://example.com/debian/rootfs.tar.gz"
///   size: large          # optional; inferred from the leaf name when absent
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub id: ArtifactId,
    pub source: String,
    #[serde(default)]
    pub size: Option<SizeClass>,
}

impl ArtifactEntry {
    pub fn into_descriptor(self) -> ArtifactDescriptor {
        let size = self
            .size
            .unwrap_or_else(|| SizeClass::classify_leaf(self.id.leaf()));
        ArtifactDescriptor::new(self.id, self.source, size)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            local_root: default_local_root(),
            download_dir: None,
            destination_prefix: default_destination_prefix(),
            connectivity: ConnectivityMode::default(),
            poll_interval: default_poll_interval(),
            base: None,
            distributions: None,
        }
    }
}

impl FetchConfig {
    pub fn base_catalog(&self) -> Result<ArtifactCatalog> {
        match &self.base {
            Some(entries) => {
                ArtifactCatalog::compose(entries.iter().cloned().map(ArtifactEntry::into_descriptor))
            }
            None => Ok(ArtifactCatalog::builtin()),
        }
    }

    pub fn distribution_sets(&self) -> DistributionSets {
        match &self.distributions {
            Some(map) => {
                let mut sets = DistributionSets::new();
                for (tag, entries) in map {
                    sets.insert(
                        tag.clone(),
                        entries
                            .iter()
                            .cloned()
                            .map(ArtifactEntry::into_descriptor)
                            .collect(),
                    );
                }
                sets
            }
            None => DistributionSets::builtin(),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| self.local_root.join("downloads"))
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        let interval = humantime::parse_duration(&self.poll_interval).map_err(|e| {
            Error::Config(format!("invalid poll_interval '{}': {}", self.poll_interval, e))
        })?;
        if interval.is_zero() {
            return Err(Error::Config("poll_interval must be greater than zero".into()));
        }
        Ok(interval)
    }

    /// Base catalog extended with `distribution`, if one is given.
    pub fn catalog_for(&self, distribution: Option<&str>) -> Result<(ArtifactCatalog, Option<catalog::Extension>)> {
        let base = self.base_catalog()?;
        match distribution {
            Some(tag) => {
                let (catalog, outcome) = base.extend(tag, &self.distribution_sets())?;
                Ok((catalog, Some(outcome)))
            }
            None => Ok((base, None)),
        }
    }
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_local_root() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/share/envfetch"),
        None => PathBuf::from("envfetch-data"),
    }
}

fn default_destination_prefix() -> String {
    DEFAULT_DESTINATION_PREFIX.to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

pub fn load_config(path: &Path) -> Result<FetchConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let config: FetchConfig = if is_yaml {
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid YAML config {}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid JSON config {}: {}", path.display(), e)))?
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &FetchConfig) -> Result<()> {
    if config.api_version != "v1" {
        return Err(Error::Config(format!(
            "unsupported api_version '{}', expected 'v1'",
            config.api_version
        )));
    }

    let prefix = config.destination_prefix.as_str();
    if prefix.is_empty() || prefix.contains(['/', '\\', ':']) {
        return Err(Error::Config(format!(
            "destination_prefix '{}' must be a non-empty name without '/', '\\' or ':'",
            prefix
        )));
    }

    config.poll_interval()?;

    let entries = config
        .base
        .iter()
        .flatten()
        .chain(config.distributions.iter().flat_map(|m| m.values().flatten()));
    for entry in entries {
        check_source(entry)?;
    }

    let base = config.base_catalog()?;
    let sets = config.distribution_sets();
    for tag in sets.tags() {
        if tag.trim().is_empty() {
            return Err(Error::Config("distribution tag cannot be empty".into()));
        }
        base.extend(tag, &sets)
            .map_err(|e| Error::Config(format!("distribution '{}': {}", tag, e)))?;
    }

    Ok(())
}

fn check_source(entry: &ArtifactEntry) -> Result<()> {
    let url = reqwest::Url::parse(&entry.source)
        .map_err(|e| Error::Config(format!("{}: invalid source '{}': {}", entry.id, entry.source, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{}: unsupported source scheme '{}'",
            entry.id, other
        ))),
    }
}
