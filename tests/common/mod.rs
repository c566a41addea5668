// tests/common/mod.rs - Shared test helpers (MiniWorkspace)
#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A test helper that creates a minimal workspace layout in a temp directory
/// and provides methods to run the flowdeck binary against it.
pub struct MiniWorkspace {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    _root_tmp: TempDir,
    _config_tmp: TempDir,
}

impl MiniWorkspace {
    /// Empty workspace marked by a bare `flowdeck.json`.
    pub fn new() -> Self {
        let root_tmp = TempDir::new().unwrap();
        let config_tmp = TempDir::new().unwrap();

        let ws = MiniWorkspace {
            root: root_tmp.path().to_path_buf(),
            config_dir: config_tmp.path().to_path_buf(),
            _root_tmp: root_tmp,
            _config_tmp: config_tmp,
        };
        ws.write_json("flowdeck.json", &json!({}));
        ws
    }

    /// Workspace with three flows: `f1` unfiled ("Digest"), `f2` in Sales
    /// ("Leads") and `f3` in Accounting ("Invoices"), plus a step form
    /// for `f2`.
    pub fn sample() -> Self {
        let ws = MiniWorkspace::new();
        ws.write_flows(&[
            ("f1", None, "Digest"),
            ("f2", Some("A"), "Leads"),
            ("f3", Some("B"), "Invoices"),
        ]);
        ws.write_folders(&[("A", "Sales"), ("B", "Accounting")]);
        ws.write_form(
            "f2",
            &json!({
                "stepName": "send_email",
                "properties": {
                    "to": {"displayName": "To", "type": "SHORT_TEXT"},
                    "count": {"displayName": "Count", "type": "NUMBER", "defaultValue": 1},
                    "auth": {"displayName": "Connection", "type": "OAUTH2"}
                },
                "settings": {"input": {"to": "ops@example.com", "count": 3}}
            }),
        );
        ws
    }

    /// Write a JSON file relative to the workspace root.
    pub fn write_json(&self, rel: &str, value: &Value) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, serde_json::to_string_pretty(value).unwrap() + "\n").unwrap();
    }

    pub fn read_json(&self, rel: &str) -> Value {
        let content = fs::read_to_string(self.root.join(rel)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    /// Write `flows.json` from (id, folder, display name) triples.
    pub fn write_flows(&self, flows: &[(&str, Option<&str>, &str)]) {
        let data: Vec<Value> = flows
            .iter()
            .map(|(id, folder, name)| {
                json!({"id": id, "folderId": folder, "version": {"displayName": name}})
            })
            .collect();
        self.write_json("flows.json", &json!({ "data": data }));
    }

    pub fn write_folders(&self, folders: &[(&str, &str)]) {
        let data: Vec<Value> = folders
            .iter()
            .map(|(id, name)| json!({"id": id, "displayName": name}))
            .collect();
        self.write_json("folders.json", &Value::Array(data));
    }

    pub fn write_form(&self, flow_id: &str, form: &Value) {
        self.write_json(&format!("forms/{}.json", flow_id), form);
    }

    pub fn read_form(&self, flow_id: &str) -> Value {
        self.read_json(&format!("forms/{}.json", flow_id))
    }

    /// Workspace-level config (`flowdeck.json`).
    pub fn write_config(&self, config: &Value) {
        self.write_json("flowdeck.json", config);
    }

    /// User-level config, picked up through FLOWDECK_CONFIG.
    pub fn write_user_config(&self, config: &Value) {
        fs::write(
            self.user_config_path(),
            serde_json::to_string_pretty(config).unwrap() + "\n",
        )
        .unwrap();
    }

    pub fn user_config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Run the flowdeck binary with given args.
    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    /// Run the flowdeck binary with given args and extra env vars.
    pub fn run_with_env(&self, args: &[&str], env_overrides: &[(&str, &str)]) -> Output {
        self.run_in(&self.root, args, env_overrides)
    }

    /// Run from an arbitrary working directory.
    pub fn run_in(&self, cwd: &Path, args: &[&str], env_overrides: &[(&str, &str)]) -> Output {
        let binary = binary_path();

        let mut cmd = Command::new(&binary);
        cmd.args(args)
            .current_dir(cwd)
            .env("FLOWDECK_CONFIG", self.user_config_path())
            .env_remove("RUST_LOG");

        for (key, val) in env_overrides {
            cmd.env(key, val);
        }

        cmd.output().unwrap_or_else(|e| {
            panic!("Failed to run flowdeck binary at {}: {}", binary.display(), e)
        })
    }

    /// Get stdout from a run as String.
    pub fn run_stdout(&self, args: &[&str]) -> String {
        let output = self.run(args);
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Get stderr from a run as String.
    pub fn run_stderr(&self, args: &[&str]) -> String {
        let output = self.run(args);
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    /// Run with `--json` and parse stdout.
    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut full: Vec<&str> = args.to_vec();
        full.push("--json");
        let output = self.run(&full);
        assert!(
            output.status.success(),
            "flowdeck {:?} failed: {}",
            full,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

/// The flowdeck binary built by cargo for this test run.
fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_flowdeck"))
}
