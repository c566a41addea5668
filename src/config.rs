// config.rs - Workspace config loading and layered merging

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const WORKSPACE_CONFIG: &str = "flowdeck.json";
pub const WORKSPACE_LOCAL_CONFIG: &str = "flowdeck.local.json";

/// Workspace config with Option fields for layered merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub project_id: Option<String>,
    pub flows_file: Option<String>,
    pub folders_file: Option<String>,
    pub forms_dir: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub log: Option<String>,
}

/// Resolved config with concrete values (no Options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub project_id: String,
    pub flows_file: String,
    pub folders_file: String,
    pub forms_dir: String,
    pub permissions: Vec<String>,
    pub log: Option<String>,
}

impl WorkspaceConfig {
    /// Merge another config on top of self (other wins for present fields).
    pub fn merge(self, other: WorkspaceConfig) -> WorkspaceConfig {
        WorkspaceConfig {
            project_id: other.project_id.or(self.project_id),
            flows_file: other.flows_file.or(self.flows_file),
            folders_file: other.folders_file.or(self.folders_file),
            forms_dir: other.forms_dir.or(self.forms_dir),
            permissions: other.permissions.or(self.permissions),
            log: other.log.or(self.log),
        }
    }

    /// Resolve to concrete values with defaults.
    pub fn resolve(self) -> ResolvedConfig {
        ResolvedConfig {
            project_id: self.project_id.unwrap_or_else(|| "default".to_string()),
            flows_file: self.flows_file.unwrap_or_else(|| "flows.json".to_string()),
            folders_file: self
                .folders_file
                .unwrap_or_else(|| "folders.json".to_string()),
            forms_dir: self.forms_dir.unwrap_or_else(|| "forms".to_string()),
            permissions: self.permissions.unwrap_or_else(|| {
                ["READ_FLOW", "WRITE_FLOW", "WRITE_FOLDER"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            log: self.log,
        }
    }
}

impl ResolvedConfig {
    pub fn flows_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.flows_file)
    }

    pub fn folders_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.folders_file)
    }

    pub fn form_path(&self, workspace: &Path, flow_id: &str) -> PathBuf {
        workspace
            .join(&self.forms_dir)
            .join(format!("{}.json", flow_id))
    }
}

/// Load a JSON file, returning empty object on any error.
pub fn load_json(path: &Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or(Value::Object(Default::default())),
        Err(_) => Value::Object(Default::default()),
    }
}

/// Atomically write JSON to a file via tempfile + persist.
pub fn write_json_atomic(path: &Path, data: &Value) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    let content = serde_json::to_string_pretty(data)? + "\n";
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Load a JSON file as WorkspaceConfig, returning default on any error.
pub fn load_workspace_config(path: &Path) -> WorkspaceConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config layer");
            WorkspaceConfig::default()
        }),
        Err(_) => WorkspaceConfig::default(),
    }
}

/// User-level config file, e.g. `~/.config/flowdeck/config.json`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flowdeck").join("config.json"))
}

/// Resolve workspace config by merging config layers.
///
/// Layers (lowest -> highest priority):
///   1. Hardcoded defaults
///   2. User config (`<config_dir>/flowdeck/config.json`)
///   3. Workspace flowdeck.json
///   4. Workspace flowdeck.local.json
pub fn resolve_config(workspace: &Path, user_config: Option<&Path>) -> ResolvedConfig {
    let mut layers = Vec::new();
    if let Some(user) = user_config {
        layers.push(load_workspace_config(user));
    }
    layers.push(load_workspace_config(&workspace.join(WORKSPACE_CONFIG)));
    layers.push(load_workspace_config(&workspace.join(WORKSPACE_LOCAL_CONFIG)));

    let mut config = WorkspaceConfig::default();
    for layer in layers {
        config = config.merge(layer);
    }
    config.resolve()
}
