//! Typed, ordered parameter maps owned by layers.
//!
//! A layer's defaults fix both the set of parameter names and the type of
//! every value. Loading external data coerces against those defaults or
//! keeps the default; it never changes a parameter's type and never grows
//! the map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::Rgb;

/// Tagged value type for a single layer parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(Rgb),
    /// Enum-style parameter: a current value plus a fixed option set. Only
    /// the value changes at runtime; the options come from the defaults.
    Choice { value: String, options: Vec<String> },
}

impl ParamValue {
    pub fn choice(value: &str, options: Vec<String>) -> Self {
        ParamValue::Choice {
            value: value.to_string(),
            options,
        }
    }

    /// JSON wire shape, kept compatible with profiles written by the
    /// original desktop app: colors become `[r, g, b]` and choices become
    /// `[value, [options...]]`.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(v) => Value::from(*v),
            ParamValue::Int(v) => Value::from(*v),
            ParamValue::Float(v) => Value::from(*v),
            ParamValue::Text(v) => Value::from(v.clone()),
            ParamValue::Color(c) => Value::from(vec![c.0 as i64, c.1 as i64, c.2 as i64]),
            ParamValue::Choice { value, options } => Value::Array(vec![
                Value::from(value.clone()),
                Value::Array(options.iter().cloned().map(Value::from).collect()),
            ]),
        }
    }

    /// Best-effort coercion of an incoming JSON value against this default.
    /// Returns `None` when the shapes are incompatible, in which case the
    /// default is retained.
    pub fn coerce(&self, incoming: &Value) -> Option<ParamValue> {
        match self {
            ParamValue::Bool(_) => incoming.as_bool().map(ParamValue::Bool),
            ParamValue::Int(_) => incoming
                .as_i64()
                .or_else(|| incoming.as_f64().map(|f| f as i64))
                .map(ParamValue::Int),
            ParamValue::Float(_) => incoming.as_f64().map(ParamValue::Float),
            ParamValue::Text(_) => incoming.as_str().map(|s| ParamValue::Text(s.to_string())),
            ParamValue::Color(_) => json_color(incoming).map(ParamValue::Color),
            ParamValue::Choice { options, .. } => {
                // Accept either a bare string or the serialized
                // `[value, [options...]]` pair; the option set always stays
                // the one from the defaults.
                let value = incoming
                    .as_str()
                    .map(|s| s.to_string())
                    .or_else(|| incoming.as_array()?.first()?.as_str().map(|s| s.to_string()))?;
                Some(ParamValue::Choice {
                    value,
                    options: options.clone(),
                })
            }
        }
    }
}

fn json_color(value: &Value) -> Option<Rgb> {
    let arr = value.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let channel = |v: &Value| -> Option<u8> {
        v.as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .map(|n| n.clamp(0, 255) as u8)
    };
    Some(Rgb(channel(&arr[0])?, channel(&arr[1])?, channel(&arr[2])?))
}

/// Ordered mapping from parameter name to value. Insertion order is the
/// order defaults were declared in, which doubles as the UI ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with its default value.
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replaces a parameter's value. Writes to unknown names are ignored;
    /// the default map fixes the parameter set.
    pub fn set(&mut self, name: &str, value: ParamValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(ParamValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        match self.get(name) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i64,
            _ => default,
        }
    }

    pub fn float_or(&self, name: &str, default: f32) -> f32 {
        match self.get(name) {
            Some(ParamValue::Float(v)) => *v as f32,
            Some(ParamValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    pub fn color_or(&self, name: &str, default: Rgb) -> Rgb {
        match self.get(name) {
            Some(ParamValue::Color(c)) => *c,
            _ => default,
        }
    }

    /// Current value of a choice parameter (also accepts plain text).
    pub fn choice_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.get(name) {
            Some(ParamValue::Choice { value, .. }) => value,
            Some(ParamValue::Text(value)) => value,
            _ => default,
        }
    }

    /// Serializes every parameter into a JSON object.
    pub fn to_json_map(&self) -> serde_json::Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Applies persisted values on top of the defaults. Unknown keys are
    /// dropped; incompatible values leave the default in place.
    pub fn apply_json(&mut self, data: &serde_json::Map<String, Value>) {
        for (name, default) in self.entries.iter_mut() {
            if let Some(incoming) = data.get(name) {
                if let Some(coerced) = default.coerce(incoming) {
                    *default = coerced;
                }
            }
        }
    }
}
