// execution_mode.rs - Per-property MANUAL / DYNAMIC / AUTO toggle

use crate::form_state::{FormState, FormStateError, PropertySettings};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How a property's value is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyExecutionMode {
    /// Entered by the user.
    #[default]
    Manual,
    /// Computed from an expression.
    Dynamic,
    /// Filled in automatically.
    Auto,
}

impl PropertyExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyExecutionMode::Manual => "MANUAL",
            PropertyExecutionMode::Dynamic => "DYNAMIC",
            PropertyExecutionMode::Auto => "AUTO",
        }
    }
}

impl fmt::Display for PropertyExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    ShortText,
    LongText,
    Markdown,
    Dropdown,
    StaticDropdown,
    Number,
    Checkbox,
    #[serde(rename = "OAUTH2")]
    OAuth2,
    SecretText,
    Array,
    Object,
    BasicAuth,
    Json,
    MultiSelectDropdown,
    StaticMultiSelectDropdown,
    Dynamic,
    CustomAuth,
    DateTime,
    File,
    Color,
    #[serde(other)]
    Other,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::ShortText => "SHORT_TEXT",
            PropertyType::LongText => "LONG_TEXT",
            PropertyType::Markdown => "MARKDOWN",
            PropertyType::Dropdown => "DROPDOWN",
            PropertyType::StaticDropdown => "STATIC_DROPDOWN",
            PropertyType::Number => "NUMBER",
            PropertyType::Checkbox => "CHECKBOX",
            PropertyType::OAuth2 => "OAUTH2",
            PropertyType::SecretText => "SECRET_TEXT",
            PropertyType::Array => "ARRAY",
            PropertyType::Object => "OBJECT",
            PropertyType::BasicAuth => "BASIC_AUTH",
            PropertyType::Json => "JSON",
            PropertyType::MultiSelectDropdown => "MULTI_SELECT_DROPDOWN",
            PropertyType::StaticMultiSelectDropdown => "STATIC_MULTI_SELECT_DROPDOWN",
            PropertyType::Dynamic => "DYNAMIC",
            PropertyType::CustomAuth => "CUSTOM_AUTH",
            PropertyType::DateTime => "DATE_TIME",
            PropertyType::File => "FILE",
            PropertyType::Color => "COLOR",
            PropertyType::Other => "OTHER",
        }
    }

    /// Credential fields never expose a mode toggle.
    pub fn is_auth(self) -> bool {
        matches!(
            self,
            PropertyType::OAuth2 | PropertyType::CustomAuth | PropertyType::BasicAuth
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(display_name: &str, property_type: PropertyType) -> Self {
        PropertyDescriptor {
            display_name: display_name.to_string(),
            property_type,
            required: false,
            default_value: None,
            description: None,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Mode restored when AUTO is switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resume {
    Manual,
    Dynamic,
}

/// Toggle state. AUTO remembers whether it was entered from DYNAMIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleState {
    Manual,
    Dynamic,
    Auto { resume: Resume },
}

/// A press on one of the two toggles, carrying the requested pressed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEvent {
    Dynamic(bool),
    Auto(bool),
}

/// Shape of the adjacent input value for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueFormat {
    Typed,
    Expression,
}

impl From<Resume> for ToggleState {
    fn from(resume: Resume) -> Self {
        match resume {
            Resume::Manual => ToggleState::Manual,
            Resume::Dynamic => ToggleState::Dynamic,
        }
    }
}

impl ToggleState {
    pub fn mode(self) -> PropertyExecutionMode {
        match self {
            ToggleState::Manual => PropertyExecutionMode::Manual,
            ToggleState::Dynamic => PropertyExecutionMode::Dynamic,
            ToggleState::Auto { .. } => PropertyExecutionMode::Auto,
        }
    }

    /// Rebuild from stored settings; no entry means MANUAL.
    pub fn from_settings(settings: Option<&PropertySettings>) -> Self {
        let Some(settings) = settings else {
            return ToggleState::Manual;
        };
        match settings.mode.unwrap_or_default() {
            PropertyExecutionMode::Manual => ToggleState::Manual,
            PropertyExecutionMode::Dynamic => ToggleState::Dynamic,
            PropertyExecutionMode::Auto => ToggleState::Auto {
                resume: if settings.resume == Some(PropertyExecutionMode::Dynamic) {
                    Resume::Dynamic
                } else {
                    Resume::Manual
                },
            },
        }
    }

    pub fn to_settings(self) -> PropertySettings {
        PropertySettings {
            mode: Some(self.mode()),
            resume: match self {
                ToggleState::Auto {
                    resume: Resume::Dynamic,
                } => Some(PropertyExecutionMode::Dynamic),
                _ => None,
            },
        }
    }

    /// Transition table.
    ///
    /// | state         | Dynamic(on) | Dynamic(off) | Auto(on)        | Auto(off) |
    /// |---------------|-------------|--------------|-----------------|-----------|
    /// | Manual        | Dynamic     | Manual       | Auto{Manual}    | Manual    |
    /// | Dynamic       | Dynamic     | Manual       | Auto{Dynamic}   | Dynamic   |
    /// | Auto{r}       | Dynamic     | Manual       | Auto{r}         | r         |
    pub fn on(self, event: ToggleEvent) -> ToggleState {
        match (self, event) {
            (_, ToggleEvent::Dynamic(true)) => ToggleState::Dynamic,
            (_, ToggleEvent::Dynamic(false)) => ToggleState::Manual,
            (ToggleState::Manual, ToggleEvent::Auto(true)) => ToggleState::Auto {
                resume: Resume::Manual,
            },
            (ToggleState::Dynamic, ToggleEvent::Auto(true)) => ToggleState::Auto {
                resume: Resume::Dynamic,
            },
            (ToggleState::Auto { resume }, ToggleEvent::Auto(false)) => resume.into(),
            (state, ToggleEvent::Auto(_)) => state,
        }
    }

    fn value_format(self) -> ValueFormat {
        match self {
            ToggleState::Manual
            | ToggleState::Auto {
                resume: Resume::Manual,
            } => ValueFormat::Typed,
            ToggleState::Dynamic
            | ToggleState::Auto {
                resume: Resume::Dynamic,
            } => ValueFormat::Expression,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation entry point
// ---------------------------------------------------------------------------

/// A mode transition to be written to form state.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    pub property_name: String,
    pub from: ToggleState,
    pub to: ToggleState,
    pub default_value: Option<Value>,
}

/// Single entry point through which every mode transition is written.
pub trait ModeWriter {
    fn write_mode(&mut self, change: &ModeChange) -> Result<(), FormStateError>;
}

impl ModeWriter for FormState {
    /// Store the new mode and reshape the adjacent input when the value
    /// format flips: an expression needs text, a typed value falls back to
    /// the property default.
    fn write_mode(&mut self, change: &ModeChange) -> Result<(), FormStateError> {
        self.set_property_settings(&change.property_name, &change.to.to_settings())?;

        let from = change.from.value_format();
        let to = change.to.value_format();
        if from == to {
            return Ok(());
        }
        match to {
            ValueFormat::Expression => {
                let text = match self.input_value(&change.property_name) {
                    Some(Value::String(_)) | Some(Value::Null) | None => None,
                    Some(other) => Some(other.to_string()),
                };
                if let Some(text) = text {
                    self.set_input_value(&change.property_name, Value::String(text))?;
                }
            }
            ValueFormat::Typed => match &change.default_value {
                Some(default) => self.set_input_value(&change.property_name, default.clone())?,
                None => {
                    self.remove_input_value(&change.property_name);
                }
            },
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

pub const DYNAMIC_TOOLTIP: &str = "Dynamic value";
pub const AUTO_TOOLTIP: &str = "Auto filled by AI";

/// Visual state of one toggle button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affordance {
    pub pressed: bool,
    pub enabled: bool,
    pub tooltip: &'static str,
}

/// What the field renderer draws next to a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleView {
    pub mode: PropertyExecutionMode,
    /// Absent when the form does not allow dynamic values.
    pub dynamic: Option<Affordance>,
    pub auto: Affordance,
}

/// Read the stored mode of a property; no entry means MANUAL.
pub fn compute_mode(form: &FormState, property_name: &str) -> PropertyExecutionMode {
    form.property_mode(property_name).unwrap_or_default()
}

/// Mode toggle for one rendered property field.
#[derive(Debug, Clone)]
pub struct ModeToggle<'a> {
    pub property_name: &'a str,
    pub property: &'a PropertyDescriptor,
    pub allow_dynamic_values: bool,
    pub disabled: bool,
}

impl<'a> ModeToggle<'a> {
    pub fn new(
        property_name: &'a str,
        property: &'a PropertyDescriptor,
        allow_dynamic_values: bool,
        disabled: bool,
    ) -> Self {
        ModeToggle {
            property_name,
            property,
            allow_dynamic_values,
            disabled,
        }
    }

    /// Auth properties render nothing.
    pub fn is_suppressed(&self) -> bool {
        self.property.property_type.is_auth()
    }

    /// Current state. A stored DYNAMIC on a form that disallows dynamic
    /// values reads as MANUAL; nothing is written back.
    pub fn state(&self, form: &FormState) -> ToggleState {
        if self.is_suppressed() {
            return ToggleState::Manual;
        }
        let state = ToggleState::from_settings(form.property_settings(self.property_name).as_ref());
        if self.allow_dynamic_values {
            return state;
        }
        match state {
            ToggleState::Dynamic => ToggleState::Manual,
            ToggleState::Auto { .. } => ToggleState::Auto {
                resume: Resume::Manual,
            },
            other => other,
        }
    }

    pub fn mode(&self, form: &FormState) -> PropertyExecutionMode {
        self.state(form).mode()
    }

    pub fn view(&self, form: &FormState) -> Option<ToggleView> {
        if self.is_suppressed() {
            return None;
        }
        let mode = self.mode(form);
        let enabled = !self.disabled;
        Some(ToggleView {
            mode,
            dynamic: self.allow_dynamic_values.then_some(Affordance {
                pressed: mode == PropertyExecutionMode::Dynamic,
                enabled,
                tooltip: DYNAMIC_TOOLTIP,
            }),
            auto: Affordance {
                pressed: mode == PropertyExecutionMode::Auto,
                enabled,
                tooltip: AUTO_TOOLTIP,
            },
        })
    }

    /// Apply a press against form state. Returns the written change, or
    /// `None` when the press was inert or left the state unchanged.
    pub fn press(
        &self,
        form: &mut FormState,
        event: ToggleEvent,
    ) -> Result<Option<ModeChange>, FormStateError> {
        let current = self.state(form);
        self.press_with(current, form, event)
    }

    /// Same as `press`, with the current state supplied by the caller and
    /// writes routed through any `ModeWriter`.
    pub fn press_with<W: ModeWriter>(
        &self,
        current: ToggleState,
        writer: &mut W,
        event: ToggleEvent,
    ) -> Result<Option<ModeChange>, FormStateError> {
        if self.is_suppressed() || self.disabled {
            tracing::debug!(property = %self.property_name, ?event, "toggle inert");
            return Ok(None);
        }
        if matches!(event, ToggleEvent::Dynamic(_)) && !self.allow_dynamic_values {
            tracing::debug!(property = %self.property_name, "dynamic values not allowed");
            return Ok(None);
        }

        let next = current.on(event);
        if next == current {
            tracing::debug!(property = %self.property_name, ?event, "no-op toggle");
            return Ok(None);
        }

        let change = ModeChange {
            property_name: self.property_name.to_string(),
            from: current,
            to: next,
            default_value: self.property.default_value.clone(),
        };
        writer.write_mode(&change)?;
        tracing::info!(
            property = %self.property_name,
            from = %current.mode(),
            to = %next.mode(),
            "property mode changed"
        );
        Ok(Some(change))
    }
}

// ---------------------------------------------------------------------------
// Step form
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Typed view of a step form document (`forms/<flowId>.json`). The
/// `settings` part lives in `FormState`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepForm {
    #[serde(default)]
    pub step_name: String,
    #[serde(default = "default_true")]
    pub allow_dynamic_values: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyDescriptor>,
}

impl StepForm {
    pub fn from_document(doc: &Value) -> Result<Self, serde_json::Error> {
        StepForm::deserialize(doc)
    }

    pub fn toggle<'a>(&'a self, property_name: &str) -> Option<ModeToggle<'a>> {
        self.properties
            .get_key_value(property_name)
            .map(|(name, property)| {
                ModeToggle::new(name, property, self.allow_dynamic_values, self.disabled)
            })
    }

    /// Toggles for every property in authoring order.
    pub fn toggles(&self) -> impl Iterator<Item = ModeToggle<'_>> {
        self.properties.iter().map(move |(name, property)| {
            ModeToggle::new(name, property, self.allow_dynamic_values, self.disabled)
        })
    }
}
