use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Variable bindings owned by one interpreter instance: name to value.
pub type Bindings = BTreeMap<String, Value>;

/// Function bindings: name to the function's source text.
pub type FunctionBindings = BTreeMap<String, String>;

/// A table key, either a numeric index or a name. The distinction is kept
/// through serialization so `t[1]` and `t["1"]` stay different entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableKey {
    Index(i64),
    Name(String),
}

/// An insertion-ordered mapping of keys to values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    entries: Vec<(TableKey, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry. Replacing an existing key keeps its position.
    pub fn insert(&mut self, key: TableKey, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &TableKey) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.get(&TableKey::Name(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TableKey, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TableKey, Value)> for Table {
    fn from_iter<I: IntoIterator<Item = (TableKey, Value)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (key, value) in iter {
            table.insert(key, value);
        }
        table
    }
}

/// A function value captured from a script: a per-interpreter stub id plus
/// the function's source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub id: u32,
    pub body: String,
}

/// The interchange value between scripts, the host, and persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Sequence(Vec<Value>),
    Table(Table),
    Function(FunctionRef),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
            Self::Sequence(_) => "sequence",
            Self::Table(_) => "table",
            Self::Function(_) => "function",
        }
    }

    /// Host truthiness, used by must-evaluate-true grading. Empty text,
    /// `"0"`, zero, and empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::Text(value) => !value.is_empty() && value != "0",
            Self::Sequence(values) => !values.is_empty(),
            Self::Table(table) => !table.is_empty(),
            Self::Function(_) => true,
        }
    }
}

/// Renders a value the way it should appear in substituted question text.
/// Whole numbers drop the decimal point.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Bool(value) => value.to_string(),
        Value::Number(value) => number_text(*value),
        Value::Text(value) => value.clone(),
        Value::Sequence(values) => format!(
            "[{}]",
            values.iter().map(display_text).collect::<Vec<_>>().join(", ")
        ),
        Value::Table(table) => {
            let entries = table
                .iter()
                .map(|(key, value)| format!("{}: {}", key_text(key), display_text(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{}}}", entries)
        }
        Value::Function(function) => format!("<function #{}>", function.id),
    }
}

/// Renders a scalar for the instructor-facing variable summary table.
/// Text is quoted so `"5"` and `5` are distinguishable in the preview.
pub fn summary_text(value: &Value) -> String {
    match value {
        Value::Text(value) => format!("\"{}\"", value.replace('"', "\\\"")),
        _ => display_text(value),
    }
}

pub fn number_text(value: f64) -> String {
    // The integer path is only safe for values that fit in an i64; a cast
    // outside that range saturates and would render the wrong numeral.
    if value.fract().abs() < f64::EPSILON && value.is_finite() && value.abs() < (i64::MAX as f64) {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

fn key_text(key: &TableKey) -> String {
    match key {
        TableKey::Index(index) => index.to_string(),
        TableKey::Name(name) => name.clone(),
    }
}
