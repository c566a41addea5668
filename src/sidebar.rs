// sidebar.rs - Sidebar render plan, routes, and reactions to flow/folder actions

use crate::folders::{partition, FolderGroup, FolderPartition, GroupKey};
use crate::model::{FlowPage, FolderRecord, Permission, PermissionSet};
use crate::source::Loadable;
use serde::Serialize;

pub const DEFAULT_LABEL: &str = "Uncategorized";
pub const HEADER_LABEL: &str = "Folders";
pub const NEW_FOLDER_TOOLTIP: &str = "New folder";
pub const PERMISSION_TOOLTIP: &str = "Permission needed";
pub const PLACEHOLDER_ROWS: usize = 6;
/// Folder id handed to "create flow" for the default group.
pub const UNASSIGNED_FOLDER: &str = "NULL";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Project-scoped route paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    project_id: String,
}

impl Routes {
    pub fn new(project_id: &str) -> Self {
        Routes {
            project_id: project_id.to_string(),
        }
    }

    pub fn flows_path(&self) -> String {
        format!("/projects/{}/flows", self.project_id)
    }

    pub fn flow_path(&self, flow_id: &str) -> String {
        format!("{}/{}", self.flows_path(), flow_id)
    }

    /// Flow id of a route, if it points at a flow of this project.
    pub fn current_flow_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        let prefix = self.flows_path();
        let rest = path.strip_prefix(prefix.as_str())?.strip_prefix('/')?;
        let id = rest.split('/').next().unwrap_or("");
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Target folder for the per-section "create flow" affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFlowTarget {
    pub folder_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowItem {
    pub id: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarSection {
    pub key: GroupKey,
    pub label: String,
    /// Shown on the default section only.
    pub count_badge: Option<usize>,
    pub default_open: bool,
    pub create_flow: CreateFlowTarget,
    /// Rename/delete menu; regular folders only.
    pub folder_actions: bool,
    pub flows: Vec<FlowItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFolderAffordance {
    pub enabled: bool,
    pub tooltip: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarPlan {
    pub header: &'static str,
    pub new_folder: NewFolderAffordance,
    pub sections: Vec<SidebarSection>,
}

impl SidebarPlan {
    pub fn section(&self, key: &GroupKey) -> Option<&SidebarSection> {
        self.sections.iter().find(|s| &s.key == key)
    }
}

/// What the sidebar shows for the current query states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarView {
    Loading { placeholder_rows: usize },
    Failed(String),
    Ready {
        partition: FolderPartition,
        plan: SidebarPlan,
    },
}

/// Build the sidebar view. Partitioning only happens once both queries
/// have resolved.
pub fn sidebar_view(
    flows: &Loadable<FlowPage>,
    folders: &Loadable<Vec<FolderRecord>>,
    current_flow_id: Option<&str>,
    permissions: &PermissionSet,
) -> SidebarView {
    if let Some(message) = flows.error().or_else(|| folders.error()) {
        return SidebarView::Failed(message.to_string());
    }
    match (flows.ready(), folders.ready()) {
        (Some(page), Some(folders)) => {
            let partition = partition(&page.data, folders, current_flow_id);
            let plan = build_plan(&partition, current_flow_id, permissions);
            SidebarView::Ready { partition, plan }
        }
        _ => SidebarView::Loading {
            placeholder_rows: PLACEHOLDER_ROWS,
        },
    }
}

/// Lay out a partition as sections: default first, then folders by name.
pub fn build_plan(
    partition: &FolderPartition,
    current_flow_id: Option<&str>,
    permissions: &PermissionSet,
) -> SidebarPlan {
    let can_write_folders = permissions.check_access(Permission::WriteFolder);
    let sections = partition
        .groups()
        .map(|group| build_section(group, current_flow_id))
        .collect();

    SidebarPlan {
        header: HEADER_LABEL,
        new_folder: NewFolderAffordance {
            enabled: can_write_folders,
            tooltip: if can_write_folders {
                NEW_FOLDER_TOOLTIP
            } else {
                PERMISSION_TOOLTIP
            },
        },
        sections,
    }
}

fn build_section(group: &FolderGroup, current_flow_id: Option<&str>) -> SidebarSection {
    let flows = group
        .flows
        .iter()
        .map(|flow| FlowItem {
            id: flow.id.clone(),
            label: flow.display_name().to_string(),
            active: current_flow_id == Some(flow.id.as_str()),
        })
        .collect();

    match &group.folder {
        None => SidebarSection {
            key: group.key.clone(),
            label: DEFAULT_LABEL.to_string(),
            count_badge: Some(group.flows.len()),
            default_open: group.initially_expanded,
            create_flow: CreateFlowTarget {
                folder_id: UNASSIGNED_FOLDER.to_string(),
            },
            folder_actions: false,
            flows,
        },
        Some(folder) => SidebarSection {
            key: group.key.clone(),
            label: folder.display_name.clone(),
            count_badge: None,
            default_open: group.initially_expanded,
            create_flow: CreateFlowTarget {
                folder_id: folder.id.clone(),
            },
            folder_actions: true,
            flows,
        },
    }
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Rename,
    MoveTo,
    Delete,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderAction {
    Create,
    Rename,
    Delete,
}

/// Follow-up the sidebar asks its host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarEffect {
    RefetchFlows,
    RefetchFolders,
    Navigate(String),
}

/// Effect of clicking a flow.
pub fn flow_click_effect(routes: &Routes, flow_id: &str) -> SidebarEffect {
    SidebarEffect::Navigate(routes.flow_path(flow_id))
}

/// Effect once a flow action has completed. Deleting the open flow leaves
/// the flow page; everything else just refreshes the list.
pub fn flow_action_effect(
    routes: &Routes,
    action: FlowAction,
    flow_id: &str,
    current_flow_id: Option<&str>,
) -> SidebarEffect {
    match action {
        FlowAction::Delete if current_flow_id == Some(flow_id) => {
            SidebarEffect::Navigate(routes.flows_path())
        }
        _ => SidebarEffect::RefetchFlows,
    }
}

pub fn folder_action_effect(_action: FolderAction) -> SidebarEffect {
    SidebarEffect::RefetchFolders
}
