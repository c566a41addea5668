// source.rs - Flow/folder data source, query state, and the JSON workspace backend

use crate::config::{write_json_atomic, ResolvedConfig};
use crate::model::{FlowPage, FlowRecord, FolderRecord};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
    #[error("flow `{0}` not found")]
    FlowNotFound(String),
    #[error("folder `{0}` not found")]
    FolderNotFound(String),
    #[error("name must not be empty")]
    EmptyName,
}

/// State of one query as seen by the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loadable<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Loadable::Ready(value),
            Err(e) => Loadable::Failed(e.to_string()),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Loadable::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Where flows and folders come from.
pub trait DataSource {
    fn list_flows(&self, project_id: &str) -> Result<FlowPage, SourceError>;
    fn list_folders(&self) -> Result<Vec<FolderRecord>, SourceError>;
}

/// Flows and folders stored as JSON files inside a workspace directory.
/// Also provides the create/rename/move/delete/duplicate actions.
#[derive(Debug, Clone)]
pub struct JsonWorkspace {
    flows_path: PathBuf,
    folders_path: PathBuf,
    forms_dir: PathBuf,
}

impl JsonWorkspace {
    pub fn new(root: &Path, config: &ResolvedConfig) -> Self {
        JsonWorkspace {
            flows_path: config.flows_path(root),
            folders_path: config.folders_path(root),
            forms_dir: root.join(&config.forms_dir),
        }
    }

    fn read_page(&self) -> Result<FlowPage, SourceError> {
        read_json_or_default(&self.flows_path)
    }

    fn read_folders(&self) -> Result<Vec<FolderRecord>, SourceError> {
        read_json_or_default(&self.folders_path)
    }

    fn write_page(&self, page: &FlowPage) -> Result<(), SourceError> {
        write_file(&self.flows_path, page)
    }

    fn write_folders(&self, folders: &[FolderRecord]) -> Result<(), SourceError> {
        write_file(&self.folders_path, &folders)
    }

    fn form_path(&self, flow_id: &str) -> PathBuf {
        self.forms_dir.join(format!("{}.json", flow_id))
    }

    /// Copy a flow's saved form to another flow id. A flow without a form
    /// file is left without one.
    fn copy_form(&self, from: &str, to: &str) -> Result<bool, SourceError> {
        let source = self.form_path(from);
        let target = self.form_path(to);
        match std::fs::copy(&source, &target) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !source.exists() => Ok(false),
            Err(e) => Err(SourceError::Write {
                path: target.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Folder actions
    // -----------------------------------------------------------------------

    pub fn create_folder(&self, display_name: &str) -> Result<FolderRecord, SourceError> {
        let display_name = non_empty(display_name)?;
        let mut folders = self.read_folders()?;
        let id = unique_id(&slug(display_name), |c| folders.iter().any(|f| f.id == c));
        let folder = FolderRecord::new(&id, display_name);
        folders.push(folder.clone());
        self.write_folders(&folders)?;
        tracing::info!(folder = %id, "folder created");
        Ok(folder)
    }

    pub fn rename_folder(&self, folder_id: &str, display_name: &str) -> Result<(), SourceError> {
        let display_name = non_empty(display_name)?;
        let mut folders = self.read_folders()?;
        let folder = folders
            .iter_mut()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| SourceError::FolderNotFound(folder_id.to_string()))?;
        folder.display_name = display_name.to_string();
        self.write_folders(&folders)
    }

    /// Remove a folder. Its flows keep the stale reference and show up in
    /// the default group.
    pub fn delete_folder(&self, folder_id: &str) -> Result<(), SourceError> {
        let mut folders = self.read_folders()?;
        let before = folders.len();
        folders.retain(|f| f.id != folder_id);
        if folders.len() == before {
            return Err(SourceError::FolderNotFound(folder_id.to_string()));
        }
        self.write_folders(&folders)?;
        tracing::info!(folder = %folder_id, "folder deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Flow actions
    // -----------------------------------------------------------------------

    pub fn rename_flow(&self, flow_id: &str, display_name: &str) -> Result<(), SourceError> {
        let display_name = non_empty(display_name)?;
        self.update_flow(flow_id, |flow| {
            flow.version.display_name = display_name.to_string();
        })
    }

    /// Move a flow into a folder, or out of any folder with `None`.
    pub fn move_flow(&self, flow_id: &str, folder_id: Option<&str>) -> Result<(), SourceError> {
        if let Some(target) = folder_id {
            if !self.read_folders()?.iter().any(|f| f.id == target) {
                return Err(SourceError::FolderNotFound(target.to_string()));
            }
        }
        self.update_flow(flow_id, |flow| {
            flow.folder_id = folder_id.map(|f| f.to_string());
        })
    }

    pub fn delete_flow(&self, flow_id: &str) -> Result<(), SourceError> {
        let mut page = self.read_page()?;
        let before = page.data.len();
        page.data.retain(|f| f.id != flow_id);
        if page.data.len() == before {
            return Err(SourceError::FlowNotFound(flow_id.to_string()));
        }
        self.write_page(&page)?;
        tracing::info!(flow = %flow_id, "flow deleted");
        Ok(())
    }

    /// Copy a flow next to the original, in the same folder. The original's
    /// form file, if any, is copied to the new id.
    pub fn duplicate_flow(&self, flow_id: &str) -> Result<FlowRecord, SourceError> {
        let mut page = self.read_page()?;
        let idx = page
            .data
            .iter()
            .position(|f| f.id == flow_id)
            .ok_or_else(|| SourceError::FlowNotFound(flow_id.to_string()))?;
        let mut copy = page.data[idx].clone();
        copy.id = unique_id(&format!("{}-copy", flow_id), |c| {
            page.data.iter().any(|f| f.id == c)
        });
        copy.version.display_name = format!("{} (copy)", copy.version.display_name);
        page.data.insert(idx + 1, copy.clone());
        self.write_page(&page)?;
        let form_copied = self.copy_form(flow_id, &copy.id)?;
        tracing::info!(flow = %flow_id, copy = %copy.id, form_copied, "flow duplicated");
        Ok(copy)
    }

    fn update_flow<F: FnOnce(&mut FlowRecord)>(
        &self,
        flow_id: &str,
        update: F,
    ) -> Result<(), SourceError> {
        let mut page = self.read_page()?;
        let flow = page
            .data
            .iter_mut()
            .find(|f| f.id == flow_id)
            .ok_or_else(|| SourceError::FlowNotFound(flow_id.to_string()))?;
        update(flow);
        self.write_page(&page)
    }
}

impl DataSource for JsonWorkspace {
    /// Flows tagged with another project are filtered out; untagged flows
    /// belong to every project.
    fn list_flows(&self, project_id: &str) -> Result<FlowPage, SourceError> {
        let mut page = self.read_page()?;
        page.data
            .retain(|f| f.project_id.as_deref().map_or(true, |p| p == project_id));
        Ok(page)
    }

    fn list_folders(&self) -> Result<Vec<FolderRecord>, SourceError> {
        self.read_folders()
    }
}

/// A missing file reads as the default value; a malformed one is an error.
fn read_json_or_default<T>(path: &Path) -> Result<T, SourceError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(SourceError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };
    serde_json::from_str(&content).map_err(|e| SourceError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn write_file<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), SourceError> {
    let value: Value = serde_json::to_value(data).map_err(|e| SourceError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    write_json_atomic(path, &value).map_err(|e| SourceError::Write {
        path: path.display().to_string(),
        message: format!("{:#}", e),
    })
}

fn non_empty(name: &str) -> Result<&str, SourceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(SourceError::EmptyName)
    } else {
        Ok(trimmed)
    }
}

fn slug(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "folder".to_string()
    } else {
        slug
    }
}

/// Append -2, -3, etc. until `taken` says no.
fn unique_id<F: Fn(&str) -> bool>(base: &str, taken: F) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn workspace(flows: Value, folders: Value) -> (TempDir, JsonWorkspace) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("flows.json"), flows.to_string()).unwrap();
        std::fs::write(dir.path().join("folders.json"), folders.to_string()).unwrap();
        let config = WorkspaceConfig::default().resolve();
        let ws = JsonWorkspace::new(dir.path(), &config);
        (dir, ws)
    }

    fn sample() -> (TempDir, JsonWorkspace) {
        workspace(
            json!({"data": [
                {"id": "f1", "folderId": "sales", "version": {"displayName": "Leads"}},
                {"id": "f2", "folderId": null, "version": {"displayName": "Digest"}},
                {"id": "f3", "projectId": "other", "version": {"displayName": "Theirs"}}
            ]}),
            json!([{"id": "sales", "displayName": "Sales"}]),
        )
    }

    #[test]
    fn test_missing_files_read_empty() {
        let dir = TempDir::new().unwrap();
        let ws = JsonWorkspace::new(dir.path(), &WorkspaceConfig::default().resolve());
        assert!(ws.list_flows("default").unwrap().data.is_empty());
        assert!(ws.list_folders().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("folders.json"), "{oops").unwrap();
        let ws = JsonWorkspace::new(dir.path(), &WorkspaceConfig::default().resolve());
        let loaded = Loadable::from_result(ws.list_folders());
        assert!(loaded.error().unwrap().contains("folders.json"));
    }

    #[test]
    fn test_list_flows_filters_other_projects() {
        let (_dir, ws) = sample();
        let ids: Vec<String> = ws
            .list_flows("default")
            .unwrap()
            .data
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[test]
    fn test_create_folder_unique_id() {
        let (_dir, ws) = sample();
        let a = ws.create_folder("Sales").unwrap();
        assert_eq!(a.id, "sales-2");
        let b = ws.create_folder("  Q3 Reports ").unwrap();
        assert_eq!(b.id, "q3-reports");
        assert_eq!(b.display_name, "Q3 Reports");
        assert!(matches!(ws.create_folder("  "), Err(SourceError::EmptyName)));
        assert_eq!(ws.list_folders().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_folder_leaves_flow_reference() {
        let (_dir, ws) = sample();
        ws.delete_folder("sales").unwrap();
        assert!(ws.list_folders().unwrap().is_empty());
        let page = ws.list_flows("default").unwrap();
        assert_eq!(page.data[0].folder_id.as_deref(), Some("sales"));
        assert!(matches!(
            ws.delete_folder("sales"),
            Err(SourceError::FolderNotFound(_))
        ));
    }

    #[test]
    fn test_move_flow_requires_known_folder() {
        let (_dir, ws) = sample();
        assert!(matches!(
            ws.move_flow("f2", Some("nope")),
            Err(SourceError::FolderNotFound(_))
        ));
        ws.move_flow("f2", Some("sales")).unwrap();
        ws.move_flow("f1", None).unwrap();
        let page = ws.list_flows("default").unwrap();
        assert_eq!(page.data[0].folder_id, None);
        assert_eq!(page.data[1].folder_id.as_deref(), Some("sales"));
    }

    #[test]
    fn test_rename_delete_duplicate_flow() {
        let (_dir, ws) = sample();
        ws.rename_flow("f1", "Hot leads").unwrap();
        let copy = ws.duplicate_flow("f1").unwrap();
        assert_eq!(copy.id, "f1-copy");
        assert_eq!(copy.display_name(), "Hot leads (copy)");
        assert_eq!(copy.folder_id.as_deref(), Some("sales"));
        assert_eq!(ws.duplicate_flow("f1").unwrap().id, "f1-copy-2");

        ws.delete_flow("f2").unwrap();
        let ids: Vec<String> = ws
            .list_flows("default")
            .unwrap()
            .data
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["f1", "f1-copy-2", "f1-copy"]);
        assert!(matches!(
            ws.rename_flow("f2", "x"),
            Err(SourceError::FlowNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_flow_copies_its_form() {
        let (dir, ws) = sample();
        let forms = dir.path().join("forms");
        std::fs::create_dir_all(&forms).unwrap();
        let form = json!({"settings": {"input": {"to": "ops@example.com"}}});
        std::fs::write(forms.join("f1.json"), form.to_string()).unwrap();

        let copy = ws.duplicate_flow("f1").unwrap();
        let copied: Value =
            serde_json::from_str(&std::fs::read_to_string(forms.join("f1-copy.json")).unwrap())
                .unwrap();
        assert_eq!(copied, form);
        assert_eq!(copy.id, "f1-copy");

        // f2 has no form, so neither does its copy
        let copy = ws.duplicate_flow("f2").unwrap();
        assert!(!forms.join(format!("{}.json", copy.id)).exists());
    }

    #[test]
    fn test_loadable_accessors() {
        let pending: Loadable<u8> = Loadable::Pending;
        assert_eq!(pending.error(), None);
        assert_eq!(pending.ready(), None);
        let ready: Loadable<u8> = Loadable::from_result::<String>(Ok(3));
        assert_eq!(ready.ready(), Some(&3));
    }
}
