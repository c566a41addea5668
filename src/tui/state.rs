// tui/state.rs - Persistent TUI state (last route) under .flowdeck/

use super::app::App;
use crate::config::write_json_atomic;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".flowdeck";
const STATE_FILE: &str = "state.json";
const LOG_FILE: &str = "tui.log";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuiState {
    /// Last route, e.g. `/projects/default/flows/f1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

pub fn state_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR)
}

/// TUI log file; the terminal is busy so logs go here instead of stderr.
pub fn log_path(workspace: &Path) -> PathBuf {
    state_dir(workspace).join(LOG_FILE)
}

/// Load state from the workspace's state file.
pub fn load_state(workspace: &Path) -> Option<TuiState> {
    let path = state_dir(workspace).join(STATE_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed TUI state");
            None
        }
    }
}

/// Save state to the workspace's state file.
pub fn save_state(workspace: &Path, state: &TuiState) -> Result<()> {
    let path = state_dir(workspace).join(STATE_FILE);
    write_json_atomic(&path, &serde_json::to_value(state)?)
}

/// Restore the saved route. Routes of another project are dropped.
pub fn apply_state(app: &mut App, state: &TuiState) {
    if let Some(route) = &state.route {
        if app.owns_route(route) {
            app.navigate(route);
        } else {
            tracing::debug!(route = %route, "saved route belongs to another project");
        }
    }
}

pub fn capture_state(app: &App) -> TuiState {
    TuiState {
        route: Some(app.route.clone()),
    }
}
