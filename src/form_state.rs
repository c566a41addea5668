// form_state.rs - Shared form document with typed property settings and change notification

use crate::config::{load_json, write_json_atomic};
use crate::execution_mode::PropertyExecutionMode;
use anyhow::Result;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use thiserror::Error;

const SETTINGS: &str = "settings";
const PROPERTY_SETTINGS: &str = "propertySettings";
const INPUT: &str = "input";
const TYPE: &str = "type";
const RESUME_TYPE: &str = "resumeType";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormStateError {
    #[error("empty form path")]
    EmptyPath,
    #[error("cannot write `{path}`: `{segment}` is not an object")]
    NotAnObject { path: String, segment: String },
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Notification sent to subscribers after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormChange {
    pub path: Vec<String>,
}

impl FormChange {
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

/// Per-property execution settings as stored under
/// `settings.propertySettings.<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySettings {
    pub mode: Option<PropertyExecutionMode>,
    /// Mode to fall back to when AUTO is switched off.
    pub resume: Option<PropertyExecutionMode>,
}

type Callback = Box<dyn FnMut(&FormChange)>;

/// Externally owned form document. Readers go through typed accessors;
/// every write notifies subscribers so the caller can re-render.
pub struct FormState {
    doc: Value,
    subscribers: Vec<(SubscriptionId, Callback)>,
    next_subscription: u64,
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("doc", &self.doc)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for FormState {
    fn default() -> Self {
        FormState::new(Value::Object(Map::new()))
    }
}

impl FormState {
    /// Wrap a document. Anything other than a JSON object starts empty.
    pub fn new(doc: Value) -> Self {
        let doc = if doc.is_object() {
            doc
        } else {
            Value::Object(Map::new())
        };
        FormState {
            doc,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Load from disk; a missing or malformed file yields an empty document.
    pub fn load(path: &Path) -> Self {
        FormState::new(load_json(path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, &self.doc)
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    // -----------------------------------------------------------------------
    // Path access
    // -----------------------------------------------------------------------

    /// Read a dotted path such as `settings.input.to`.
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        self.get_in(&split_path(path))
    }

    /// Write a dotted path, creating intermediate objects as needed.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<(), FormStateError> {
        self.set_in(&split_path(path), value)
    }

    /// Remove a dotted path. Returns the removed value, if any.
    pub fn remove_value(&mut self, path: &str) -> Option<Value> {
        self.remove_in(&split_path(path))
    }

    pub fn get_in(&self, segments: &[&str]) -> Option<&Value> {
        segments
            .iter()
            .try_fold(&self.doc, |node, segment| node.as_object()?.get(*segment))
    }

    pub fn set_in(&mut self, segments: &[&str], value: Value) -> Result<(), FormStateError> {
        let (last, parents) = segments.split_last().ok_or(FormStateError::EmptyPath)?;
        let parent = object_at_mut(&mut self.doc, parents)?;
        parent.insert(last.to_string(), value);
        self.notify(segments);
        Ok(())
    }

    pub fn remove_in(&mut self, segments: &[&str]) -> Option<Value> {
        let (last, parents) = segments.split_last()?;
        let mut node = &mut self.doc;
        for segment in parents {
            node = node.as_object_mut()?.get_mut(*segment)?;
        }
        let removed = node.as_object_mut()?.remove(*last);
        if removed.is_some() {
            self.notify(segments);
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Typed accessors (property names are never spliced into path strings)
    // -----------------------------------------------------------------------

    /// Stored settings for a property, or `None` when there is no entry.
    /// Unrecognised mode strings read as absent.
    pub fn property_settings(&self, property_name: &str) -> Option<PropertySettings> {
        let entry = self
            .get_in(&[SETTINGS, PROPERTY_SETTINGS, property_name])?
            .as_object()?;
        Some(PropertySettings {
            mode: entry.get(TYPE).and_then(parse_mode),
            resume: entry.get(RESUME_TYPE).and_then(parse_mode),
        })
    }

    /// Stored mode for a property, `None` when absent.
    pub fn property_mode(&self, property_name: &str) -> Option<PropertyExecutionMode> {
        self.property_settings(property_name)
            .and_then(|settings| settings.mode)
    }

    /// Write a property's settings entry, keeping any unrelated keys in it.
    /// Subscribers get a single notification for the entry.
    pub fn set_property_settings(
        &mut self,
        property_name: &str,
        settings: &PropertySettings,
    ) -> Result<(), FormStateError> {
        let segments = [SETTINGS, PROPERTY_SETTINGS, property_name];
        let entry = object_at_mut(&mut self.doc, &segments)?;
        match settings.mode {
            Some(mode) => entry.insert(TYPE.to_string(), mode_value(mode)),
            None => entry.remove(TYPE),
        };
        match settings.resume {
            Some(mode) => entry.insert(RESUME_TYPE.to_string(), mode_value(mode)),
            None => entry.remove(RESUME_TYPE),
        };
        self.notify(&segments);
        Ok(())
    }

    pub fn input_value(&self, property_name: &str) -> Option<&Value> {
        self.get_in(&[SETTINGS, INPUT, property_name])
    }

    pub fn set_input_value(
        &mut self,
        property_name: &str,
        value: Value,
    ) -> Result<(), FormStateError> {
        self.set_in(&[SETTINGS, INPUT, property_name], value)
    }

    pub fn remove_input_value(&mut self, property_name: &str) -> Option<Value> {
        self.remove_in(&[SETTINGS, INPUT, property_name])
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FormChange) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, segments: &[&str]) {
        if self.subscribers.is_empty() {
            return;
        }
        let change = FormChange {
            path: segments.iter().map(|s| s.to_string()).collect(),
        };
        for (_, callback) in &mut self.subscribers {
            callback(&change);
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn parse_mode(value: &Value) -> Option<PropertyExecutionMode> {
    serde_json::from_value(value.clone()).ok()
}

fn mode_value(mode: PropertyExecutionMode) -> Value {
    Value::String(mode.as_str().to_string())
}

/// Walk to the object at `segments`, creating empty objects on the way.
fn object_at_mut<'a>(
    root: &'a mut Value,
    segments: &[&str],
) -> Result<&'a mut Map<String, Value>, FormStateError> {
    let full_path = segments.join(".");
    let mut node = root;
    for segment in segments {
        let obj = node
            .as_object_mut()
            .ok_or_else(|| FormStateError::NotAnObject {
                path: full_path.clone(),
                segment: segment.to_string(),
            })?;
        node = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let last = segments.last().copied().unwrap_or("<root>");
    node.as_object_mut().ok_or_else(|| FormStateError::NotAnObject {
        path: full_path,
        segment: last.to_string(),
    })
}
