// tui/app.rs - Pure state machine for TUI (no terminal dependency)

use crate::config::ResolvedConfig;
use crate::execution_mode::{ModeToggle, StepForm, ToggleEvent};
use crate::folders::{FolderPartition, GroupKey};
use crate::form_state::FormState;
use crate::model::{FlowPage, FolderRecord, Permission, PermissionSet};
use crate::sidebar::{
    flow_action_effect, flow_click_effect, folder_action_effect, sidebar_view, FlowAction,
    FolderAction, Routes, SidebarEffect, SidebarPlan, SidebarView, DEFAULT_LABEL,
    PERMISSION_TOOLTIP,
};
use crate::source::{DataSource, JsonWorkspace, Loadable, SourceError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Panes, rows, input modes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Sidebar,
    Fields,
}

/// A visible line of the sidebar tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SidebarRow {
    Section(GroupKey),
    Flow { group: GroupKey, flow_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    Folder(String),
    Flow(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    NewFolder,
    RenameFolder(String),
    RenameFlow(String),
    MoveFlow(String), // folder picker for this flow
    ConfirmDelete(DeleteTarget),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleKind {
    Dynamic,
    Auto,
}

/// Destination offered by the move picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveTarget {
    pub folder_id: Option<String>,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Background queries
// ---------------------------------------------------------------------------

/// Query the event loop should run off the UI thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fetch {
    Flows,
    Folders,
}

/// A queued fetch stamped with its issue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub fetch: Fetch,
    pub seq: u64,
}

#[derive(Debug)]
pub enum FetchData {
    Flows(Loadable<FlowPage>),
    Folders(Loadable<Vec<FolderRecord>>),
}

#[derive(Debug)]
pub struct FetchResult {
    pub seq: u64,
    pub data: FetchData,
}

impl FetchTicket {
    pub fn run(self, source: &dyn DataSource, project_id: &str) -> FetchResult {
        let data = match self.fetch {
            Fetch::Flows => FetchData::Flows(Loadable::from_result(source.list_flows(project_id))),
            Fetch::Folders => FetchData::Folders(Loadable::from_result(source.list_folders())),
        };
        FetchResult {
            seq: self.seq,
            data,
        }
    }
}

impl FetchData {
    fn kind(&self) -> Fetch {
        match self {
            FetchData::Flows(_) => Fetch::Flows,
            FetchData::Folders(_) => Fetch::Folders,
        }
    }
}

// ---------------------------------------------------------------------------
// Open form
// ---------------------------------------------------------------------------

/// Step form of the flow the route points at.
pub struct OpenForm {
    pub flow_id: String,
    pub path: PathBuf,
    pub state: FormState,
    pub step: Result<StepForm, String>,
    changes: Rc<RefCell<Vec<String>>>,
}

impl OpenForm {
    fn load(flow_id: &str, path: PathBuf) -> Self {
        let mut state = FormState::load(&path);
        let step = StepForm::from_document(state.document())
            .map_err(|e| format!("invalid form {}: {}", path.display(), e));

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        state.subscribe(move |change| sink.borrow_mut().push(change.path_string()));

        OpenForm {
            flow_id: flow_id.to_string(),
            path,
            state,
            step,
            changes,
        }
    }

    /// Toggles in property order; empty when the form failed to parse.
    pub fn toggles(&self) -> Vec<ModeToggle<'_>> {
        match &self.step {
            Ok(step) => step.toggles().collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct App {
    pub workspace_root: PathBuf,
    pub config: ResolvedConfig,
    pub routes: Routes,
    pub permissions: PermissionSet,
    source: JsonWorkspace,

    // Queries
    pub flows: Loadable<FlowPage>,
    pub folders: Loadable<Vec<FolderRecord>>,
    fetches: Vec<Fetch>,
    fetch_seq: u64,
    applied: HashMap<Fetch, u64>,

    // Navigation
    pub route: String,
    pub form: Option<OpenForm>,
    expanded: HashMap<GroupKey, bool>,

    // Cursor state
    pub pane: Pane,
    pub sidebar_cursor: usize,
    pub field_cursor: usize,

    // Input state
    pub input_mode: InputMode,
    pub text_input: String,
    pub picker_cursor: usize,

    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    /// Both queries start pending and are queued for the first fetch.
    pub fn new(workspace_root: PathBuf, config: ResolvedConfig) -> Self {
        let routes = Routes::new(&config.project_id);
        let source = JsonWorkspace::new(&workspace_root, &config);
        App {
            permissions: PermissionSet::from_names(&config.permissions),
            route: routes.flows_path(),
            routes,
            source,
            workspace_root,
            config,
            flows: Loadable::Pending,
            folders: Loadable::Pending,
            fetches: vec![Fetch::Flows, Fetch::Folders],
            fetch_seq: 0,
            applied: HashMap::new(),
            form: None,
            expanded: HashMap::new(),
            pane: Pane::Sidebar,
            sidebar_cursor: 0,
            field_cursor: 0,
            input_mode: InputMode::Normal,
            text_input: String::new(),
            picker_cursor: 0,
            status: None,
            should_quit: false,
        }
    }

    pub fn source(&self) -> &JsonWorkspace {
        &self.source
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Drain queued fetches, stamping each with the next sequence number.
    pub fn take_fetches(&mut self) -> Vec<FetchTicket> {
        let fetch_seq = &mut self.fetch_seq;
        std::mem::take(&mut self.fetches)
            .into_iter()
            .map(|fetch| {
                *fetch_seq += 1;
                FetchTicket {
                    fetch,
                    seq: *fetch_seq,
                }
            })
            .collect()
    }

    fn request(&mut self, fetch: Fetch) {
        if !self.fetches.contains(&fetch) {
            self.fetches.push(fetch);
        }
    }

    /// Apply a fetch result unless a newer one of the same kind already landed.
    pub fn receive(&mut self, result: FetchResult) {
        let kind = result.data.kind();
        if let Some(&last) = self.applied.get(&kind) {
            if result.seq < last {
                tracing::debug!(?kind, seq = result.seq, last, "dropping stale fetch result");
                return;
            }
        }
        self.applied.insert(kind, result.seq);
        match result.data {
            FetchData::Flows(flows) => self.flows = flows,
            FetchData::Folders(folders) => self.folders = folders,
        }
        self.sync_expansion();
    }

    /// Record each section's default-open state the first time it is seen;
    /// later toggles and refetches keep whatever is recorded.
    fn sync_expansion(&mut self) {
        let Some(plan) = self.plan() else {
            return;
        };
        for section in &plan.sections {
            self.expanded
                .entry(section.key.clone())
                .or_insert(section.default_open);
        }
        let count = self.visible_rows(&plan).len();
        self.sidebar_cursor = self.sidebar_cursor.min(count.saturating_sub(1));
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    pub fn current_flow_id(&self) -> Option<&str> {
        self.routes.current_flow_id(&self.route)
    }

    /// Whether a route belongs to this project.
    pub fn owns_route(&self, route: &str) -> bool {
        route == self.routes.flows_path() || self.routes.current_flow_id(route).is_some()
    }

    /// Switch route and (re)load the form of the flow it points at.
    pub fn navigate(&mut self, route: &str) {
        self.route = route.to_string();
        let flow_id = self.current_flow_id().map(str::to_string);
        let open = self.form.as_ref().map(|f| f.flow_id.clone());
        if flow_id == open {
            return;
        }
        tracing::debug!(route = %self.route, "navigated");
        self.field_cursor = 0;
        self.form = flow_id.map(|id| {
            let path = self.config.form_path(&self.workspace_root, &id);
            OpenForm::load(&id, path)
        });
    }

    pub fn apply_effect(&mut self, effect: SidebarEffect) {
        match effect {
            SidebarEffect::RefetchFlows => self.request(Fetch::Flows),
            SidebarEffect::RefetchFolders => self.request(Fetch::Folders),
            SidebarEffect::Navigate(path) => self.navigate(&path),
        }
    }

    // -----------------------------------------------------------------------
    // Sidebar rows
    // -----------------------------------------------------------------------

    pub fn sidebar_view(&self) -> SidebarView {
        sidebar_view(
            &self.flows,
            &self.folders,
            self.current_flow_id(),
            &self.permissions,
        )
    }

    fn partition(&self) -> Option<FolderPartition> {
        match self.sidebar_view() {
            SidebarView::Ready { partition, .. } => Some(partition),
            _ => None,
        }
    }

    fn plan(&self) -> Option<SidebarPlan> {
        match self.sidebar_view() {
            SidebarView::Ready { plan, .. } => Some(plan),
            _ => None,
        }
    }

    pub fn is_expanded(&self, key: &GroupKey, default_open: bool) -> bool {
        self.expanded.get(key).copied().unwrap_or(default_open)
    }

    /// Flatten a plan into visible rows: each section, then its flows when open.
    pub fn visible_rows(&self, plan: &SidebarPlan) -> Vec<SidebarRow> {
        let mut rows = Vec::new();
        for section in &plan.sections {
            rows.push(SidebarRow::Section(section.key.clone()));
            if self.is_expanded(&section.key, section.default_open) {
                rows.extend(section.flows.iter().map(|flow| SidebarRow::Flow {
                    group: section.key.clone(),
                    flow_id: flow.id.clone(),
                }));
            }
        }
        rows
    }

    pub fn rows(&self) -> Vec<SidebarRow> {
        self.plan()
            .map(|plan| self.visible_rows(&plan))
            .unwrap_or_default()
    }

    pub fn current_row(&self) -> Option<SidebarRow> {
        self.rows().into_iter().nth(self.sidebar_cursor)
    }

    // -----------------------------------------------------------------------
    // Cursor movement
    // -----------------------------------------------------------------------

    fn row_count(&self) -> usize {
        match self.pane {
            Pane::Sidebar => self.rows().len(),
            Pane::Fields => self.form.as_ref().map(|f| f.toggles().len()).unwrap_or(0),
        }
    }

    fn cursor_mut(&mut self) -> &mut usize {
        match self.pane {
            Pane::Sidebar => &mut self.sidebar_cursor,
            Pane::Fields => &mut self.field_cursor,
        }
    }

    /// Move cursor up, wrapping at the top.
    pub fn move_up(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }
        let cursor = self.cursor_mut();
        *cursor = if *cursor == 0 { count - 1 } else { *cursor - 1 };
    }

    /// Move cursor down, wrapping at the bottom.
    pub fn move_down(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }
        let cursor = self.cursor_mut();
        *cursor = (*cursor + 1) % count;
    }

    pub fn next_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Sidebar => Pane::Fields,
            Pane::Fields => Pane::Sidebar,
        };
    }

    // -----------------------------------------------------------------------
    // Sidebar actions
    // -----------------------------------------------------------------------

    /// Enter: open/close a section, or navigate to a flow.
    pub fn activate(&mut self) {
        match self.current_row() {
            Some(SidebarRow::Section(_)) => self.toggle_section(),
            Some(SidebarRow::Flow { flow_id, .. }) => {
                let effect = flow_click_effect(&self.routes, &flow_id);
                self.apply_effect(effect);
            }
            None => {}
        }
    }

    /// Flip the section under the cursor (or the section of the flow under it).
    pub fn toggle_section(&mut self) {
        let Some(plan) = self.plan() else {
            return;
        };
        let key = match self.current_row() {
            Some(SidebarRow::Section(key)) => key,
            Some(SidebarRow::Flow { group, .. }) => group,
            None => return,
        };
        let default_open = plan
            .section(&key)
            .map(|s| s.default_open)
            .unwrap_or(false);
        let open = !self.is_expanded(&key, default_open);
        self.expanded.insert(key.clone(), open);

        // keep the cursor on the section header
        if let Some(pos) = self
            .visible_rows(&plan)
            .iter()
            .position(|r| *r == SidebarRow::Section(key.clone()))
        {
            self.sidebar_cursor = pos;
        }
    }

    fn require(&mut self, permission: Permission) -> bool {
        if self.permissions.check_access(permission) {
            true
        } else {
            self.status = Some(PERMISSION_TOOLTIP.to_string());
            false
        }
    }

    fn begin_input(&mut self, mode: InputMode, initial: String) {
        self.input_mode = mode;
        self.text_input = initial;
        self.picker_cursor = 0;
    }

    pub fn start_new_folder(&mut self) {
        if self.plan().is_none() || !self.require(Permission::WriteFolder) {
            return;
        }
        self.begin_input(InputMode::NewFolder, String::new());
    }

    pub fn start_rename(&mut self) {
        let Some(plan) = self.plan() else {
            return;
        };
        match self.visible_rows(&plan).into_iter().nth(self.sidebar_cursor) {
            Some(SidebarRow::Section(key @ GroupKey::Folder(_))) => {
                if !self.require(Permission::WriteFolder) {
                    return;
                }
                let label = plan.section(&key).map(|s| s.label.clone()).unwrap_or_default();
                if let GroupKey::Folder(id) = key {
                    self.begin_input(InputMode::RenameFolder(id), label);
                }
            }
            Some(SidebarRow::Flow { group, flow_id }) => {
                if !self.require(Permission::WriteFlow) {
                    return;
                }
                let label = plan
                    .section(&group)
                    .and_then(|s| s.flows.iter().find(|f| f.id == flow_id))
                    .map(|f| f.label.clone())
                    .unwrap_or_default();
                self.begin_input(InputMode::RenameFlow(flow_id), label);
            }
            _ => {}
        }
    }

    pub fn start_move(&mut self) {
        let Some(SidebarRow::Flow { group, flow_id }) = self.current_row() else {
            return;
        };
        if !self.require(Permission::WriteFlow) {
            return;
        }
        self.begin_input(InputMode::MoveFlow(flow_id), String::new());
        self.picker_cursor = self
            .move_targets()
            .iter()
            .position(|t| t.folder_id.as_deref() == group.folder_id())
            .unwrap_or(0);
    }

    pub fn start_delete(&mut self) {
        match self.current_row() {
            Some(SidebarRow::Section(GroupKey::Folder(id))) => {
                if self.require(Permission::WriteFolder) {
                    self.begin_input(
                        InputMode::ConfirmDelete(DeleteTarget::Folder(id)),
                        String::new(),
                    );
                }
            }
            Some(SidebarRow::Flow { flow_id, .. }) => {
                if self.require(Permission::WriteFlow) {
                    self.begin_input(
                        InputMode::ConfirmDelete(DeleteTarget::Flow(flow_id)),
                        String::new(),
                    );
                }
            }
            _ => {}
        }
    }

    /// Question shown while a delete waits for confirmation.
    pub fn delete_prompt(&self) -> Option<String> {
        let InputMode::ConfirmDelete(target) = &self.input_mode else {
            return None;
        };
        let partition = self.partition();
        let prompt = match target {
            DeleteTarget::Folder(id) => {
                let group = partition
                    .as_ref()
                    .and_then(|p| p.group(&GroupKey::Folder(id.clone())));
                match group {
                    Some(group) => {
                        let name = group
                            .folder
                            .as_ref()
                            .map(|f| f.display_name.as_str())
                            .unwrap_or(id);
                        let count = group.flows.len();
                        let noun = if count == 1 { "flow" } else { "flows" };
                        format!("Delete folder \"{}\" ({} {})?", name, count, noun)
                    }
                    None => "Delete this folder?".to_string(),
                }
            }
            DeleteTarget::Flow(flow_id) => {
                let name = partition.as_ref().and_then(|p| {
                    let key = p.group_of(flow_id)?;
                    let group = p.group(key)?;
                    group
                        .flows
                        .iter()
                        .find(|f| &f.id == flow_id)
                        .map(|f| f.display_name().to_string())
                });
                match name {
                    Some(name) => format!("Delete flow \"{}\"?", name),
                    None => "Delete this flow?".to_string(),
                }
            }
        };
        Some(prompt)
    }

    pub fn duplicate_flow(&mut self) {
        let Some(SidebarRow::Flow { flow_id, .. }) = self.current_row() else {
            return;
        };
        if !self.require(Permission::WriteFlow) {
            return;
        }
        let current = self.current_flow_id().map(str::to_string);
        let outcome = self.source.duplicate_flow(&flow_id).map(|copy| {
            (
                flow_action_effect(&self.routes, FlowAction::Duplicate, &flow_id, current.as_deref()),
                format!("Duplicated as {}", copy.display_name()),
            )
        });
        self.finish_action(outcome);
    }

    /// "Uncategorized" first, then folders in sidebar order.
    pub fn move_targets(&self) -> Vec<MoveTarget> {
        let mut targets = vec![MoveTarget {
            folder_id: None,
            label: DEFAULT_LABEL.to_string(),
        }];
        if let Some(plan) = self.plan() {
            targets.extend(plan.sections.iter().filter_map(|s| {
                s.key.folder_id().map(|id| MoveTarget {
                    folder_id: Some(id.to_string()),
                    label: s.label.clone(),
                })
            }));
        }
        targets
    }

    pub fn picker_up(&mut self) {
        let count = self.move_targets().len();
        self.picker_cursor = if self.picker_cursor == 0 {
            count - 1
        } else {
            self.picker_cursor - 1
        };
    }

    pub fn picker_down(&mut self) {
        let count = self.move_targets().len();
        self.picker_cursor = (self.picker_cursor + 1) % count;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.text_input.clear();
    }

    /// Run the action the current input mode collects.
    pub fn confirm_input(&mut self) {
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
        let text = std::mem::take(&mut self.text_input);
        let current = self.current_flow_id().map(str::to_string);
        let current = current.as_deref();

        let outcome = match &mode {
            InputMode::Normal => return,
            InputMode::NewFolder => self.source.create_folder(&text).map(|folder| {
                (
                    folder_action_effect(FolderAction::Create),
                    format!("Created folder {}", folder.display_name),
                )
            }),
            InputMode::RenameFolder(id) => self.source.rename_folder(id, &text).map(|_| {
                (
                    folder_action_effect(FolderAction::Rename),
                    format!("Renamed folder to {}", text.trim()),
                )
            }),
            InputMode::RenameFlow(id) => self.source.rename_flow(id, &text).map(|_| {
                (
                    flow_action_effect(&self.routes, FlowAction::Rename, id, current),
                    format!("Renamed flow to {}", text.trim()),
                )
            }),
            InputMode::MoveFlow(id) => {
                let Some(target) = self.move_targets().into_iter().nth(self.picker_cursor) else {
                    return;
                };
                self.source
                    .move_flow(id, target.folder_id.as_deref())
                    .map(|_| {
                        (
                            flow_action_effect(&self.routes, FlowAction::MoveTo, id, current),
                            format!("Moved to {}", target.label),
                        )
                    })
            }
            InputMode::ConfirmDelete(DeleteTarget::Folder(id)) => {
                self.source.delete_folder(id).map(|_| {
                    (
                        folder_action_effect(FolderAction::Delete),
                        "Deleted folder".to_string(),
                    )
                })
            }
            InputMode::ConfirmDelete(DeleteTarget::Flow(id)) => {
                self.source.delete_flow(id).map(|_| {
                    (
                        flow_action_effect(&self.routes, FlowAction::Delete, id, current),
                        "Deleted flow".to_string(),
                    )
                })
            }
        };

        let deleted_flow = outcome.is_ok()
            && matches!(mode, InputMode::ConfirmDelete(DeleteTarget::Flow(_)));
        self.finish_action(outcome);
        if deleted_flow {
            // the list still holds the deleted flow
            self.request(Fetch::Flows);
        }
    }

    fn finish_action(&mut self, outcome: Result<(SidebarEffect, String), SourceError>) {
        match outcome {
            Ok((effect, message)) => {
                self.status = Some(message);
                self.apply_effect(effect);
            }
            Err(e) => {
                tracing::warn!(error = %e, "sidebar action failed");
                self.status = Some(format!("Error: {}", e));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Field toggles
    // -----------------------------------------------------------------------

    /// Press the dynamic or auto toggle of the field under the cursor.
    pub fn press_toggle(&mut self, kind: ToggleKind) {
        let cursor = self.field_cursor;
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let OpenForm { step, state, .. } = form;
        let Ok(step) = step.as_ref() else {
            return;
        };
        let Some(toggle) = step.toggles().nth(cursor) else {
            return;
        };

        let message = match toggle.view(state) {
            None => Some(format!("{} has no mode toggle", toggle.property_name)),
            Some(view) if !view.auto.enabled => Some("Step is read-only".to_string()),
            Some(view) => {
                let event = match kind {
                    ToggleKind::Dynamic => view.dynamic.map(|a| ToggleEvent::Dynamic(!a.pressed)),
                    ToggleKind::Auto => Some(ToggleEvent::Auto(!view.auto.pressed)),
                };
                match event {
                    None => Some("Dynamic values are not allowed here".to_string()),
                    Some(event) => match toggle.press(state, event) {
                        Ok(Some(change)) => Some(format!(
                            "{}: {} -> {}",
                            change.property_name,
                            change.from.mode(),
                            change.to.mode()
                        )),
                        Ok(None) => None,
                        Err(e) => Some(format!("Error: {}", e)),
                    },
                }
            }
        };
        if message.is_some() {
            self.status = message;
        }
        self.flush_form();
    }

    /// Persist the open form if anything changed since the last flush.
    pub fn flush_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let changed: Vec<String> = form.changes.borrow_mut().drain(..).collect();
        if changed.is_empty() {
            return;
        }
        tracing::debug!(paths = ?changed, "form changed");
        if let Err(e) = form.state.save(&form.path) {
            tracing::warn!(path = %form.path.display(), error = %e, "failed to save form");
            self.status = Some(format!("Error saving form: {:#}", e));
        }
    }
}
