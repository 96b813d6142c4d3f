use std::collections::BTreeMap;

use qs_core::{summary_text, Bindings, FunctionBindings, TableKey, Value};

use crate::path::render_path_key;

/// Assigns each distinct function body a small stable number, so summaries
/// can show `<function #N>` instead of the body. Same body, same number;
/// numbering follows first-seen order starting at zero.
#[derive(Debug, Default)]
pub struct FunctionStubber {
    seen: Vec<String>,
}

impl FunctionStubber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(&mut self, body: &str) -> u32 {
        if let Some(index) = self.seen.iter().position(|known| known == body) {
            return index as u32;
        }
        self.seen.push(body.to_string());
        (self.seen.len() - 1) as u32
    }

    pub fn stub(&mut self, body: &str) -> String {
        format!("<function #{}>", self.id_for(body))
    }
}

/// Flattens an environment into printable `path -> value` pairs. Nested
/// tables and sequences recurse with extended paths; sequences index from
/// zero; functions become stub strings.
pub fn summarize_environment(
    variables: &Bindings,
    functions: &FunctionBindings,
    stubber: &mut FunctionStubber,
) -> BTreeMap<String, String> {
    let mut summary = BTreeMap::new();
    for (name, value) in variables {
        summarize_value(value, name, &mut summary, stubber);
    }
    for (name, body) in functions {
        summary.insert(name.clone(), stubber.stub(body));
    }
    summary
}

fn summarize_value(
    value: &Value,
    path: &str,
    summary: &mut BTreeMap<String, String>,
    stubber: &mut FunctionStubber,
) {
    match value {
        Value::Table(table) => {
            for (key, child) in table.iter() {
                summarize_value(child, &render_path_key(path, key), summary, stubber);
            }
        }
        Value::Sequence(values) => {
            for (index, child) in values.iter().enumerate() {
                let key = TableKey::Index(index as i64);
                summarize_value(child, &render_path_key(path, &key), summary, stubber);
            }
        }
        Value::Function(function) => {
            summary.insert(path.to_string(), stubber.stub(&function.body));
        }
        scalar => {
            summary.insert(path.to_string(), summary_text(scalar));
        }
    }
}
