//! Property expansion
//!
//! One output record per property value of the element in a column. An
//! empty name list selects every property.

use super::operator::{BoxedOperator, Operator};
use crate::error::Result;
use crate::graph::{Field, PropertyField, RawRecord};
use std::collections::VecDeque;

fn wanted(names: &[String], name: &str) -> bool {
    names.is_empty() || names.iter().any(|n| n == name)
}

/// Property fields of a vertex, edge or vertex property (its meta properties)
pub fn expand_properties(field: &Field, names: &[String]) -> Vec<PropertyField> {
    match field {
        Field::Vertex(v) => v
            .borrow()
            .properties()
            .filter(|p| wanted(names, &p.name))
            .flat_map(|p| p.values.values().cloned().map(PropertyField::VertexSingle))
            .collect(),
        Field::Edge(e) => e
            .properties()
            .filter(|p| wanted(names, &p.name))
            .cloned()
            .map(PropertyField::Edge)
            .collect(),
        Field::Property(PropertyField::VertexSingle(s)) => s
            .meta
            .values()
            .filter(|m| wanted(names, &m.name))
            .cloned()
            .map(PropertyField::Meta)
            .collect(),
        _ => Vec::new(),
    }
}

pub struct PropertiesOperator {
    input: BoxedOperator,
    column: usize,
    names: Vec<String>,
    /// Emit bare values instead of property fields
    values_only: bool,
    output: VecDeque<RawRecord>,
    open: bool,
}

impl PropertiesOperator {
    pub fn new(input: BoxedOperator, column: usize, names: Vec<String>) -> Self {
        Self {
            input,
            column,
            names,
            values_only: false,
            output: VecDeque::new(),
            open: true,
        }
    }

    /// `values()`: same expansion, appending the scalar value
    pub fn values(input: BoxedOperator, column: usize, names: Vec<String>) -> Self {
        Self {
            values_only: true,
            ..Self::new(input, column, names)
        }
    }
}

impl Operator for PropertiesOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            if let Some(r) = self.output.pop_front() {
                return Ok(Some(r));
            }
            let Some(record) = self.input.next()? else {
                break;
            };
            let Some(field) = record.get(self.column) else {
                continue;
            };
            for p in expand_properties(field, &self.names) {
                let value = if self.values_only {
                    p.values()
                        .first()
                        .map(|s| Field::Value((*s).clone()))
                } else {
                    Some(Field::Property(p))
                };
                if let Some(value) = value {
                    let mut out = record.clone();
                    out.append_field(value);
                    self.output.push_back(out);
                }
            }
        }
        self.close();
        Ok(None)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        self.output.clear();
        self.open = true;
    }
}
