//! Deduplication
//!
//! Global dedup keeps the first record per composite key in input order.
//! Local dedup removes repeated elements inside one collection or path
//! field using natural value equality.

use super::function::BoxedScalar;
use super::operator::{BoxedOperator, Operator};
use crate::error::{Error, Result};
use crate::graph::{CollectionField, Field, PathField, RawRecord};
use std::collections::HashSet;

/// Composite key of a record: the string forms of every key value
fn composite_key(keys: &[BoxedScalar], record: &RawRecord) -> Result<Vec<String>> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| match k.evaluate(record)? {
            Some(f) => Ok(f.to_value()),
            None => Err(Error::UnresolvedValue(format!("去重键 #{} 在记录上没有值", i))),
        })
        .collect()
}

pub struct DedupOperator {
    input: BoxedOperator,
    keys: Vec<BoxedScalar>,
    seen: HashSet<Vec<String>>,
    open: bool,
}

impl DedupOperator {
    pub fn new(input: BoxedOperator, keys: Vec<BoxedScalar>) -> Self {
        Self {
            input,
            keys,
            seen: HashSet::new(),
            open: true,
        }
    }
}

impl Operator for DedupOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        while let Some(r) = self.input.next()? {
            let key = composite_key(&self.keys, &r)?;
            if self.seen.insert(key) {
                return Ok(Some(r));
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
        self.seen.clear();
        self.open = true;
    }
}

pub struct DedupLocalOperator {
    input: BoxedOperator,
    column: usize,
    open: bool,
}

impl DedupLocalOperator {
    pub fn new(input: BoxedOperator, column: usize) -> Self {
        Self {
            input,
            column,
            open: true,
        }
    }
}

fn dedup_field(field: &Field) -> Field {
    match field {
        Field::Collection(c) => {
            let mut seen: Vec<&Field> = Vec::new();
            let mut items = Vec::new();
            for item in &c.items {
                if !seen.contains(&item) {
                    seen.push(item);
                    items.push(item.clone());
                }
            }
            Field::Collection(CollectionField::new(items))
        }
        Field::Path(p) => {
            let mut steps = Vec::new();
            let mut seen: Vec<Option<Field>> = Vec::new();
            for step in &p.steps {
                if !seen.contains(&step.value) {
                    seen.push(step.value.clone());
                    steps.push(step.clone());
                }
            }
            Field::Path(PathField::new(steps))
        }
        other => other.clone(),
    }
}

impl Operator for DedupLocalOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut record) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        if let Some(field) = record.get(self.column) {
            let deduped = dedup_field(field);
            record.set(self.column, Some(deduped));
        }
        Ok(Some(record))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        self.open = true;
    }
}
