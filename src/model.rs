// model.rs - Flow and folder records, flow pages, permissions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Version metadata carried by a flow. Only the display name matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowVersion {
    pub display_name: String,
}

/// A stored flow as returned by the flow listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub id: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub version: FlowVersion,
}

impl FlowRecord {
    pub fn new(id: &str, folder_id: Option<&str>, display_name: &str) -> Self {
        FlowRecord {
            id: id.to_string(),
            folder_id: folder_id.map(|f| f.to_string()),
            project_id: None,
            version: FlowVersion {
                display_name: display_name.to_string(),
            },
        }
    }

    pub fn display_name(&self) -> &str {
        &self.version.display_name
    }
}

/// A named folder. Display names are not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub display_name: String,
}

impl FolderRecord {
    pub fn new(id: &str, display_name: &str) -> Self {
        FolderRecord {
            id: id.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// One page of the flow listing (cursor-paginated).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPage {
    #[serde(default)]
    pub data: Vec<FlowRecord>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ReadFlow,
    WriteFlow,
    WriteFolder,
}

impl Permission {
    pub fn parse(name: &str) -> Option<Permission> {
        match name.trim().to_ascii_uppercase().as_str() {
            "READ_FLOW" => Some(Permission::ReadFlow),
            "WRITE_FLOW" => Some(Permission::WriteFlow),
            "WRITE_FOLDER" => Some(Permission::WriteFolder),
            _ => None,
        }
    }
}

/// Granted permissions for the current user. Answers `check_access`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    granted: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Build from config strings; unknown names are dropped.
    pub fn from_names(names: &[String]) -> Self {
        let granted = names
            .iter()
            .filter_map(|n| {
                let parsed = Permission::parse(n);
                if parsed.is_none() {
                    tracing::warn!(permission = %n, "ignoring unknown permission name");
                }
                parsed
            })
            .collect();
        PermissionSet { granted }
    }

    pub fn all() -> Self {
        PermissionSet {
            granted: [
                Permission::ReadFlow,
                Permission::WriteFlow,
                Permission::WriteFolder,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn check_access(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_record_from_listing_json() {
        let page: FlowPage = serde_json::from_value(json!({
            "data": [
                {"id": "f1", "folderId": null, "version": {"displayName": "Onboarding"}},
                {"id": "f2", "folderId": "A", "version": {"displayName": "Invoices"}},
                {"id": "f3", "version": {"displayName": "No folder key"}}
            ],
            "next": null
        }))
        .unwrap();
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.data[0].folder_id, None);
        assert_eq!(page.data[1].folder_id.as_deref(), Some("A"));
        assert_eq!(page.data[2].folder_id, None);
        assert_eq!(page.data[1].display_name(), "Invoices");
    }

    #[test]
    fn test_permission_set_ignores_unknown() {
        let set = PermissionSet::from_names(&[
            "write_folder".to_string(),
            "ADMIN".to_string(),
        ]);
        assert!(set.check_access(Permission::WriteFolder));
        assert!(!set.check_access(Permission::WriteFlow));
    }
}
