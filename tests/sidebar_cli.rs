// tests/sidebar_cli.rs - Folder sidebar output tests

mod common;
use common::MiniWorkspace;
use serde_json::{json, Value};

fn section_labels(out: &Value) -> Vec<String> {
    out["plan"]["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn text_sidebar_lists_default_group_then_folders_by_name() {
    let ws = MiniWorkspace::sample();

    let stdout = ws.run_stdout(&["--sidebar"]);
    assert_eq!(
        stdout,
        "Folders\n\
         > Uncategorized (1)\n    Digest [f1]\n\
         > Accounting\n    Invoices [f3]\n\
         > Sales\n    Leads [f2]\n"
    );
}

#[test]
fn bare_invocation_without_tty_prints_sidebar() {
    let ws = MiniWorkspace::sample();

    let output = ws.run(&[]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Folders\n"), "got: {}", stdout);
}

#[test]
fn current_flow_opens_its_folder_and_marks_it_active() {
    let ws = MiniWorkspace::sample();

    let stdout = ws.run_stdout(&["--current-flow", "f2"]);
    assert!(stdout.contains("v Sales\n  * Leads [f2]\n"), "got: {}", stdout);
    assert!(stdout.contains("> Accounting\n"));
    assert!(stdout.contains("> Uncategorized (1)\n"));
}

#[test]
fn current_flow_accepts_a_route() {
    let ws = MiniWorkspace::sample();

    let out = ws.run_json(&["--current-flow", "/projects/default/flows/f1"]);
    assert_eq!(out["current_flow"], "f1");
    assert_eq!(out["partition"]["expanded_group"], json!({"kind": "default"}));
    assert_eq!(out["plan"]["sections"][0]["default_open"], true);
}

#[test]
fn route_of_another_project_is_rejected() {
    let ws = MiniWorkspace::sample();

    let output = ws.run(&["--current-flow", "/projects/other/flows/f1"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("not a flow route"), "got: {}", stderr);
}

#[test]
fn flows_with_unknown_folder_land_in_default_group() {
    let ws = MiniWorkspace::new();
    ws.write_flows(&[("f1", Some("gone"), "Orphan"), ("f2", Some("A"), "Kept")]);
    ws.write_folders(&[("A", "Ops")]);

    let out = ws.run_json(&["--sidebar"]);
    let default_flows = out["partition"]["default_group"]["flows"].as_array().unwrap();
    assert_eq!(default_flows.len(), 1);
    assert_eq!(default_flows[0]["id"], "f1");
    assert_eq!(out["plan"]["sections"][0]["count_badge"], 1);
}

#[test]
fn empty_folders_still_get_sections() {
    let ws = MiniWorkspace::new();
    ws.write_flows(&[]);
    ws.write_folders(&[("A", "beta"), ("B", "Alpha")]);

    let out = ws.run_json(&[]);
    assert_eq!(section_labels(&out), vec!["Uncategorized", "Alpha", "beta"]);
    assert_eq!(out["plan"]["sections"][0]["count_badge"], 0);
}

#[test]
fn folder_names_sort_case_insensitively_with_lowercase_first() {
    let ws = MiniWorkspace::new();
    ws.write_flows(&[]);
    ws.write_folders(&[("1", "Zeta"), ("2", "alpha"), ("3", "Alpha"), ("4", "beta")]);

    let out = ws.run_json(&[]);
    assert_eq!(
        section_labels(&out),
        vec!["Uncategorized", "alpha", "Alpha", "beta", "Zeta"]
    );
}

#[test]
fn duplicate_folder_names_keep_source_order() {
    let ws = MiniWorkspace::new();
    ws.write_flows(&[("f1", Some("second"), "x")]);
    ws.write_folders(&[("first", "Same"), ("second", "Same")]);

    let out = ws.run_json(&[]);
    let sections = out["plan"]["sections"].as_array().unwrap();
    assert_eq!(sections[1]["key"], json!({"kind": "folder", "id": "first"}));
    assert_eq!(sections[2]["key"], json!({"kind": "folder", "id": "second"}));
    assert_eq!(sections[2]["flows"][0]["id"], "f1");
}

#[test]
fn create_flow_targets_null_folder_for_default_group() {
    let ws = MiniWorkspace::sample();

    let out = ws.run_json(&[]);
    let sections = out["plan"]["sections"].as_array().unwrap();
    assert_eq!(sections[0]["create_flow"]["folder_id"], "NULL");
    assert_eq!(sections[0]["folder_actions"], false);
    assert_eq!(sections[1]["create_flow"]["folder_id"], "B");
    assert_eq!(sections[1]["folder_actions"], true);
}

#[test]
fn missing_folder_permission_disables_new_folder() {
    let ws = MiniWorkspace::sample();
    ws.write_config(&json!({"permissions": ["READ_FLOW"]}));

    let out = ws.run_json(&[]);
    assert_eq!(out["plan"]["new_folder"]["enabled"], false);
    assert_eq!(out["plan"]["new_folder"]["tooltip"], "Permission needed");

    let stdout = ws.run_stdout(&[]);
    assert!(stdout.starts_with("Folders  (new folder: Permission needed)\n"));
}

#[test]
fn malformed_flows_file_fails() {
    let ws = MiniWorkspace::sample();
    std::fs::write(ws.root.join("flows.json"), "{ not json").unwrap();

    let output = ws.run(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("Failed to load sidebar"), "got: {}", stderr);
}

#[test]
fn flows_of_other_projects_are_hidden() {
    let ws = MiniWorkspace::new();
    ws.write_json(
        "flows.json",
        &json!({"data": [
            {"id": "mine", "projectId": "p1", "version": {"displayName": "Mine"}},
            {"id": "theirs", "projectId": "p2", "version": {"displayName": "Theirs"}},
            {"id": "shared", "version": {"displayName": "Shared"}}
        ]}),
    );
    ws.write_config(&json!({"project_id": "p1"}));

    let out = ws.run_json(&[]);
    let ids: Vec<&str> = out["partition"]["default_group"]["flows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["mine", "shared"]);
}
