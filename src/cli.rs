// cli.rs - CLI argument parsing and headless orchestration

use crate::config::{
    resolve_config, user_config_path, ResolvedConfig, WORKSPACE_CONFIG, WORKSPACE_LOCAL_CONFIG,
};
use crate::execution_mode::{ModeToggle, StepForm, ToggleEvent, ToggleView};
use crate::form_state::FormState;
use crate::model::PermissionSet;
use crate::sidebar::{sidebar_view, Routes, SidebarPlan, SidebarView};
use crate::source::{DataSource, JsonWorkspace, Loadable};
use crate::tui::state;
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "flowdeck",
    about = "Browse flows grouped by folder and switch step properties between manual, dynamic and auto values."
)]
pub struct Cli {
    /// Workspace directory (default: nearest ancestor holding flowdeck.json or flows.json)
    #[arg(long)]
    pub workspace: Option<String>,

    /// Open flow, as a flow id or a route like /projects/<id>/flows/<flow>
    #[arg(long = "current-flow")]
    pub current_flow: Option<String>,

    /// Print the folder sidebar (default action)
    #[arg(long)]
    pub sidebar: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Flow whose step form to inspect or edit (default: the open flow)
    #[arg(long)]
    pub flow: Option<String>,

    /// List the execution mode of every property of the step form
    #[arg(long)]
    pub modes: bool,

    /// Press the dynamic toggle of a property: PROP=on|off
    #[arg(long, value_name = "PROP=on|off")]
    pub dynamic: Option<String>,

    /// Press the auto toggle of a property: PROP=on|off
    #[arg(long, value_name = "PROP=on|off")]
    pub auto: Option<String>,

    /// Show what a toggle would change without writing the form
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Force interactive TUI mode
    #[arg(long)]
    pub interactive: bool,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// A workspace root with its resolved configuration. Used by both CLI and TUI.
pub struct Workspace {
    pub root: PathBuf,
    pub config: ResolvedConfig,
}

impl Workspace {
    pub fn open(explicit: Option<&str>) -> Result<Self> {
        let root = find_workspace_root(explicit)?;
        let user_config = resolve_user_config();
        let config = resolve_config(&root, user_config.as_deref());
        Ok(Workspace { root, config })
    }

    pub fn source(&self) -> JsonWorkspace {
        JsonWorkspace::new(&self.root, &self.config)
    }

    pub fn routes(&self) -> Routes {
        Routes::new(&self.config.project_id)
    }

    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::from_names(&self.config.permissions)
    }

    /// Route to open: `--current-flow` if given, else the route the TUI
    /// last saved.
    pub fn initial_route(&self, current_flow: Option<&str>) -> Option<String> {
        let routes = self.routes();
        match current_flow {
            Some(arg) if arg.starts_with('/') => Some(arg.to_string()),
            Some(id) => Some(routes.flow_path(id)),
            None => state::load_state(&self.root).and_then(|s| s.route),
        }
    }
}

/// Find the workspace root: the explicit directory, else the nearest
/// ancestor of the working directory holding a workspace file.
pub fn find_workspace_root(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let path = PathBuf::from(dir);
        if !path.is_dir() {
            bail!("Workspace directory does not exist: {}", dir);
        }
        return Ok(path);
    }

    let cwd = std::env::current_dir()?;
    for ancestor in cwd.ancestors() {
        if is_workspace(ancestor) {
            return Ok(ancestor.to_path_buf());
        }
    }

    bail!(
        "Could not find workspace root (no {} or flows.json found)",
        WORKSPACE_CONFIG
    )
}

fn is_workspace(dir: &Path) -> bool {
    [WORKSPACE_CONFIG, WORKSPACE_LOCAL_CONFIG, "flows.json"]
        .iter()
        .any(|name| dir.join(name).is_file())
}

/// User config file (respects FLOWDECK_CONFIG env var).
pub fn resolve_user_config() -> Option<PathBuf> {
    std::env::var_os("FLOWDECK_CONFIG")
        .map(PathBuf::from)
        .or_else(user_config_path)
}

// ---------------------------------------------------------------------------
// Toggle arguments
// ---------------------------------------------------------------------------

/// Parse `PROP=on|off`.
fn parse_toggle_arg(arg: &str) -> Result<(String, bool)> {
    let Some((name, value)) = arg.rsplit_once('=') else {
        bail!("Invalid toggle `{}` (expected PROP=on|off)", arg);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid toggle `{}` (missing property name)", arg);
    }
    let pressed = match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => true,
        "off" | "false" | "0" => false,
        other => bail!("Invalid toggle value `{}` (expected on or off)", other),
    };
    Ok((name.to_string(), pressed))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

pub fn run(args: Cli, workspace: &Workspace) -> Result<()> {
    // --- Validate conflicting flags ---
    if args.dynamic.is_some() && args.auto.is_some() {
        bail!("--dynamic and --auto are mutually exclusive");
    }
    let toggle = match (&args.dynamic, &args.auto) {
        (Some(arg), None) => {
            let (name, pressed) = parse_toggle_arg(arg)?;
            Some((name, ToggleEvent::Dynamic(pressed)))
        }
        (None, Some(arg)) => {
            let (name, pressed) = parse_toggle_arg(arg)?;
            Some((name, ToggleEvent::Auto(pressed)))
        }
        _ => None,
    };
    if args.dry_run && toggle.is_none() {
        bail!("--dry-run only applies to --dynamic or --auto");
    }
    if args.flow.is_some() && !args.modes && toggle.is_none() {
        bail!("--flow only applies to --modes, --dynamic or --auto");
    }
    if args.sidebar && (args.modes || toggle.is_some()) {
        bail!("--sidebar cannot be combined with --modes, --dynamic or --auto");
    }

    let routes = workspace.routes();
    let current_route = workspace.initial_route(args.current_flow.as_deref());
    let current_flow = current_route
        .as_deref()
        .and_then(|r| routes.current_flow_id(r))
        .map(str::to_string);
    if let (Some(route), None, Some(_)) = (&current_route, &current_flow, &args.current_flow) {
        bail!(
            "--current-flow `{}` is not a flow route of project {}",
            route,
            workspace.config.project_id
        );
    }

    if let Some((property, event)) = toggle {
        let flow_id = select_flow(&args, current_flow.as_deref())?;
        return run_toggle(workspace, &flow_id, &property, event, args.dry_run, args.json);
    }
    if args.modes {
        let flow_id = select_flow(&args, current_flow.as_deref())?;
        return run_modes(workspace, &flow_id, args.json);
    }
    run_sidebar(workspace, current_flow.as_deref(), args.json)
}

fn select_flow(args: &Cli, current_flow: Option<&str>) -> Result<String> {
    match args.flow.as_deref().or(current_flow) {
        Some(id) => Ok(id.to_string()),
        None => bail!("No flow selected (pass --flow or --current-flow)"),
    }
}

// ---------------------------------------------------------------------------
// Sidebar
// ---------------------------------------------------------------------------

fn run_sidebar(workspace: &Workspace, current_flow: Option<&str>, as_json: bool) -> Result<()> {
    let source = workspace.source();
    let flows = Loadable::from_result(source.list_flows(&workspace.config.project_id));
    let folders = Loadable::from_result(source.list_folders());

    let (partition, plan) = match sidebar_view(&flows, &folders, current_flow, &workspace.permissions()) {
        SidebarView::Ready { partition, plan } => (partition, plan),
        SidebarView::Failed(message) => bail!("Failed to load sidebar: {}", message),
        SidebarView::Loading { .. } => bail!("Sidebar data did not load"),
    };

    if as_json {
        let out = json!({
            "project_id": workspace.config.project_id,
            "current_flow": current_flow,
            "current_group": current_flow.and_then(|id| partition.group_of(id)),
            "flow_count": partition.flow_count(),
            "partition": partition,
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render_sidebar_text(&plan));
    }
    Ok(())
}

/// Plain-text tree. Closed sections still list their flows, indented under
/// a `>` marker; open ones use `v`.
pub fn render_sidebar_text(plan: &SidebarPlan) -> String {
    let mut out = String::new();
    out.push_str(plan.header);
    if !plan.new_folder.enabled {
        out.push_str(&format!("  (new folder: {})", plan.new_folder.tooltip));
    }
    out.push('\n');

    for section in &plan.sections {
        let marker = if section.default_open { "v" } else { ">" };
        out.push_str(&format!("{} {}", marker, section.label));
        if let Some(count) = section.count_badge {
            out.push_str(&format!(" ({})", count));
        }
        out.push('\n');
        for flow in &section.flows {
            let active = if flow.active { "*" } else { " " };
            out.push_str(&format!("  {} {} [{}]\n", active, flow.label, flow.id));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Step form
// ---------------------------------------------------------------------------

fn load_form(workspace: &Workspace, flow_id: &str) -> Result<(PathBuf, FormState, StepForm)> {
    let path = workspace.config.form_path(&workspace.root, flow_id);
    if !path.is_file() {
        bail!("No form found for flow `{}` ({})", flow_id, path.display());
    }
    let form = FormState::load(&path);
    let step = StepForm::from_document(form.document())
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok((path, form, step))
}

fn view_json(toggle: &ModeToggle, view: Option<ToggleView>) -> serde_json::Value {
    json!({
        "name": toggle.property_name,
        "display_name": toggle.property.display_name,
        "type": toggle.property.property_type,
        "view": view,
    })
}

fn view_text(toggle: &ModeToggle, view: Option<&ToggleView>, name_width: usize) -> String {
    let head = format!(
        "  {:<width$}  {:<12}",
        toggle.property_name,
        toggle.property.property_type.as_str(),
        width = name_width
    );
    match view {
        None => format!("{}  (no mode toggle)", head),
        Some(view) => {
            let dynamic = match &view.dynamic {
                Some(a) if a.pressed => "on",
                Some(_) => "off",
                None => "n/a",
            };
            let auto = if view.auto.pressed { "on" } else { "off" };
            format!(
                "{}  {:<7}  dynamic:{:<3}  auto:{}",
                head,
                view.mode.as_str(),
                dynamic,
                auto
            )
        }
    }
}

fn run_modes(workspace: &Workspace, flow_id: &str, as_json: bool) -> Result<()> {
    let (_, form, step) = load_form(workspace, flow_id)?;
    let toggles: Vec<ModeToggle> = step.toggles().collect();

    if as_json {
        let properties: Vec<serde_json::Value> = toggles
            .iter()
            .map(|t| view_json(t, t.view(&form)))
            .collect();
        let out = json!({
            "flow": flow_id,
            "step": step.step_name,
            "allow_dynamic_values": step.allow_dynamic_values,
            "disabled": step.disabled,
            "properties": properties,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Step: {} ({})", step.step_name, flow_id);
    if step.disabled {
        println!("  (read-only)");
    }
    let name_width = toggles.iter().map(|t| t.property_name.len()).max().unwrap_or(0);
    for toggle in &toggles {
        println!("{}", view_text(toggle, toggle.view(&form).as_ref(), name_width));
    }
    Ok(())
}

fn run_toggle(
    workspace: &Workspace,
    flow_id: &str,
    property: &str,
    event: ToggleEvent,
    dry_run: bool,
    as_json: bool,
) -> Result<()> {
    let (path, mut form, step) = load_form(workspace, flow_id)?;
    let Some(toggle) = step.toggle(property) else {
        bail!("Flow `{}` has no property `{}`", flow_id, property);
    };
    if toggle.is_suppressed() {
        bail!("Property `{}` is an auth field and has no mode toggle", property);
    }
    if step.disabled {
        bail!("Step `{}` is read-only", step.step_name);
    }
    if matches!(event, ToggleEvent::Dynamic(_)) && !step.allow_dynamic_values {
        bail!("Step `{}` does not allow dynamic values", step.step_name);
    }

    let change = toggle.press(&mut form, event)?;
    let input = form.input_value(property).cloned();

    if as_json {
        let out = json!({
            "flow": flow_id,
            "property": property,
            "changed": change.is_some(),
            "mode": toggle.mode(&form),
            "input": input,
            "dry_run": dry_run,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        if dry_run {
            println!("=== DRY RUN (no changes will be made) ===");
        }
        match &change {
            Some(change) => println!("{}: {} -> {}", property, change.from.mode(), change.to.mode()),
            None => println!("{}: {} (unchanged)", property, toggle.mode(&form)),
        }
        if let Some(value) = &input {
            println!("  input: {}", value);
        }
    }

    if change.is_some() && !dry_run {
        form.save(&path)
            .with_context(|| format!("saving {}", path.display()))?;
    }
    Ok(())
}
