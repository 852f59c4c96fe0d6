//! Loading pipeline: finds data files, deserializes them by extension and
//! turns them into engine inputs.
//!
//! A scenario directory holds `network.{ron,toml,json}` (required) and
//! optionally `tuning.*` and `spikes.*`. Exactly one format may exist per
//! base name.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use twinsim_core::engine::SimConfig;
use twinsim_core::topology::Topology;
use twinsim_core::validation::{TopologyIssue, validate_topology};

use crate::schema::{SpikeScriptData, TuningData, TuningError};

/// Base name of the required network file.
pub const NETWORK_FILE: &str = "network";
/// Base name of the optional tuning file.
pub const TUNING_FILE: &str = "tuning";
/// Base name of the optional spike script.
pub const SCRIPT_FILE: &str = "spikes";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A tuning value is out of range.
    #[error("invalid tuning in {file}: {source}")]
    Tuning {
        file: PathBuf,
        #[source]
        source: TuningError,
    },

    /// The network has no nodes.
    #[error("network in {file} has no nodes")]
    EmptyNetwork { file: PathBuf },

    /// A spike script names a node the network does not have.
    #[error("unknown node '{name}' in {file}")]
    UnknownNode { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Typed loaders
// ===========================================================================

/// Load a network file. Problems that resolution tolerates (dangling lanes,
/// duplicate keys, out-of-range inventory) are logged and returned, not
/// treated as errors.
pub fn load_network(path: &Path) -> Result<(Topology, Vec<TopologyIssue>), DataLoadError> {
    let topology: Topology = deserialize_file(path)?;
    if topology.nodes.is_empty() {
        return Err(DataLoadError::EmptyNetwork {
            file: path.to_path_buf(),
        });
    }

    let issues = validate_topology(&topology);
    for issue in &issues {
        tracing::warn!(file = %path.display(), ?issue, "network issue");
    }
    tracing::debug!(
        file = %path.display(),
        nodes = topology.nodes.len(),
        lanes = topology.edges.len(),
        "loaded network"
    );
    Ok((topology, issues))
}

/// Load a tuning file and overlay it on the default configuration.
pub fn load_tuning(path: &Path) -> Result<SimConfig, DataLoadError> {
    let data: TuningData = deserialize_file(path)?;
    data.to_config().map_err(|source| DataLoadError::Tuning {
        file: path.to_path_buf(),
        source,
    })
}

/// Load a spike script and check every node key it names against `topology`.
pub fn load_script(path: &Path, topology: &Topology) -> Result<SpikeScriptData, DataLoadError> {
    let script: SpikeScriptData = deserialize_file(path)?;

    let scripted = script.spikes.iter().map(|s| &s.node);
    let random = script.random.iter().flat_map(|r| r.targets.iter());
    if let Some(name) = scripted.chain(random).find(|key| topology.node(key).is_none()) {
        return Err(DataLoadError::UnknownNode {
            file: path.to_path_buf(),
            name: name.clone(),
        });
    }
    Ok(script)
}

// ===========================================================================
// Scenario directories
// ===========================================================================

/// Everything a scenario directory describes.
#[derive(Debug, Clone)]
pub struct ScenarioData {
    pub topology: Topology,
    /// Non-fatal problems found in the network file.
    pub issues: Vec<TopologyIssue>,
    /// Default configuration when no tuning file exists.
    pub config: SimConfig,
    pub script: Option<SpikeScriptData>,
}

/// Load a scenario directory: the network is required, tuning and script
/// are optional.
pub fn load_scenario(dir: &Path) -> Result<ScenarioData, DataLoadError> {
    let network_path = require_data_file(dir, NETWORK_FILE)?;
    let (topology, issues) = load_network(&network_path)?;

    let config = match find_data_file(dir, TUNING_FILE)? {
        Some(path) => load_tuning(&path)?,
        None => SimConfig::default(),
    };

    let script = find_data_file(dir, SCRIPT_FILE)?
        .map(|path| load_script(&path, &topology))
        .transpose()?;

    tracing::info!(
        dir = %dir.display(),
        nodes = topology.nodes.len(),
        issues = issues.len(),
        scripted = script.is_some(),
        "loaded scenario"
    );
    Ok(ScenarioData {
        topology,
        issues,
        config,
        script,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
