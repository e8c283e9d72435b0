use std::collections::BTreeMap;

use super::flow::{ColumnSpec, Field};
use super::text::normalize_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBinding {
    pub index: usize,
    pub label: String,
}

/// Canonical field -> the header cell that carries it in one sheet.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    bindings: BTreeMap<Field, ColumnBinding>,
}

impl SchemaMap {
    pub fn get(&self, field: Field) -> Option<&ColumnBinding> {
        self.bindings.get(&field)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (Field, &ColumnBinding)> {
        self.bindings.iter().map(|(field, binding)| (*field, binding))
    }

    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required
            .iter()
            .copied()
            .filter(|field| !self.bindings.contains_key(field))
            .collect()
    }

    /// Raw cell text for `field`, or `""` when the column or cell is absent.
    pub fn value<'a>(&self, field: Field, row: &'a [String]) -> &'a str {
        self.get(field)
            .and_then(|binding| row.get(binding.index))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }
}

/// Resolves each field to the first accepted spelling present in `labels`.
/// Unmatched fields are simply left out; callers decide what is mandatory.
pub fn map_schema(labels: &[String], columns: &[ColumnSpec]) -> SchemaMap {
    let mut by_normalized = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        let normalized = normalize_text(label);
        if normalized.is_empty() {
            continue;
        }
        by_normalized.entry(normalized).or_insert(ColumnBinding {
            index,
            label: label.trim().to_string(),
        });
    }

    let mut bindings = BTreeMap::new();
    for spec in columns {
        if bindings.contains_key(&spec.field) {
            continue;
        }
        let found = spec
            .spellings
            .iter()
            .find_map(|spelling| by_normalized.get(&normalize_text(spelling)));
        if let Some(binding) = found {
            bindings.insert(spec.field, binding.clone());
        }
    }

    SchemaMap { bindings }
}

pub fn found_columns(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
