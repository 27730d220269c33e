//! Accumulation
//!
//! Accumulators fold records into one value. `ProjectAggregationOperator`
//! and `GroupOperator` consume the whole input and emit a single row;
//! `AggregateOperator` and `StoreOperator` attach a collection of values to
//! every row they pass on.

use super::compare::{natural_order, scalar_values};
use super::function::BoxedScalar;
use super::operator::{BoxedOperator, Operator};
use crate::error::{Error, Result};
use crate::graph::{CollectionField, Field, MapField, RawRecord};
use crate::types::JsonDataType;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::trace;

pub trait AggregateFunction {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()>;

    /// Current value, `None` when nothing has been accumulated
    fn result(&self) -> Option<Field>;

    fn reset(&mut self);
}

pub type BoxedAggregate = Box<dyn AggregateFunction>;

#[derive(Debug, Default)]
pub struct Count {
    count: i64,
}

impl Count {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AggregateFunction for Count {
    fn accumulate(&mut self, _record: &RawRecord) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        Some(Field::long(self.count))
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Numeric values of a field; non-numeric values are skipped
fn numbers(field: &Field) -> Vec<(f64, bool)> {
    scalar_values(field)
        .iter()
        .filter_map(|s| {
            let integral = matches!(s.data_type, JsonDataType::Int | JsonDataType::Long);
            s.as_f64().map(|n| (n, integral))
        })
        .collect()
}

fn number_field(n: f64, integral: bool) -> Field {
    if integral {
        Field::long(n as i64)
    } else {
        Field::double(n)
    }
}

pub struct Sum {
    value: BoxedScalar,
    total: f64,
    integral: bool,
    seen: bool,
}

impl Sum {
    pub fn new(value: BoxedScalar) -> Self {
        Self {
            value,
            total: 0.0,
            integral: true,
            seen: false,
        }
    }
}

impl AggregateFunction for Sum {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()> {
        if let Some(f) = self.value.evaluate(record)? {
            for (n, integral) in numbers(&f) {
                self.total += n;
                self.integral &= integral;
                self.seen = true;
            }
        }
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        self.seen.then(|| number_field(self.total, self.integral))
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.integral = true;
        self.seen = false;
    }
}

pub struct Mean {
    value: BoxedScalar,
    total: f64,
    count: usize,
}

impl Mean {
    pub fn new(value: BoxedScalar) -> Self {
        Self {
            value,
            total: 0.0,
            count: 0,
        }
    }
}

impl AggregateFunction for Mean {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()> {
        if let Some(f) = self.value.evaluate(record)? {
            for (n, _) in numbers(&f) {
                self.total += n;
                self.count += 1;
            }
        }
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        (self.count > 0).then(|| Field::double(self.total / self.count as f64))
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }
}

/// Min or max under the natural order
pub struct Extremum {
    value: BoxedScalar,
    keep: Ordering,
    current: Option<Field>,
}

impl Extremum {
    pub fn min(value: BoxedScalar) -> Self {
        Self {
            value,
            keep: Ordering::Less,
            current: None,
        }
    }

    pub fn max(value: BoxedScalar) -> Self {
        Self {
            value,
            keep: Ordering::Greater,
            current: None,
        }
    }
}

impl AggregateFunction for Extremum {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()> {
        let Some(f) = self.value.evaluate(record)? else {
            return Ok(());
        };
        let replace = match &self.current {
            Some(c) => natural_order(&f, c) == self.keep,
            None => true,
        };
        if replace {
            self.current = Some(f);
        }
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        self.current.clone()
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

pub struct Fold {
    value: BoxedScalar,
    items: Vec<Field>,
}

impl Fold {
    pub fn new(value: BoxedScalar) -> Self {
        Self {
            value,
            items: Vec::new(),
        }
    }
}

impl AggregateFunction for Fold {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()> {
        if let Some(f) = self.value.evaluate(record)? {
            self.items.push(f);
        }
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        Some(Field::Collection(CollectionField::new(self.items.clone())))
    }

    fn reset(&mut self) {
        self.items.clear();
    }
}

/// Key → collection of values, in first-seen key order
pub struct Group {
    key: BoxedScalar,
    value: BoxedScalar,
    groups: IndexMap<String, (Field, Vec<Field>)>,
}

impl Group {
    pub fn new(key: BoxedScalar, value: BoxedScalar) -> Self {
        Self {
            key,
            value,
            groups: IndexMap::new(),
        }
    }
}

impl AggregateFunction for Group {
    fn accumulate(&mut self, record: &RawRecord) -> Result<()> {
        let key = self
            .key
            .evaluate(record)?
            .ok_or_else(|| Error::UnresolvedValue("分组键在记录上没有值".to_string()))?;
        let entry = self
            .groups
            .entry(key.to_value())
            .or_insert_with(|| (key, Vec::new()));
        if let Some(v) = self.value.evaluate(record)? {
            entry.1.push(v);
        }
        Ok(())
    }

    fn result(&self) -> Option<Field> {
        let mut map = MapField::new();
        for (key, values) in self.groups.values() {
            map.insert(key.clone(), Field::Collection(CollectionField::new(values.clone())));
        }
        Some(Field::Map(map))
    }

    fn reset(&mut self) {
        self.groups.clear();
    }
}

/// One final row holding every accumulator's result.
///
/// `None` slots are placeholders and produce null columns.
pub struct ProjectAggregationOperator {
    input: BoxedOperator,
    accumulators: Vec<Option<BoxedAggregate>>,
    done: bool,
    open: bool,
}

impl ProjectAggregationOperator {
    pub fn new(input: BoxedOperator, accumulators: Vec<Option<BoxedAggregate>>) -> Self {
        Self {
            input,
            accumulators,
            done: false,
            open: true,
        }
    }
}

impl Operator for ProjectAggregationOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open || self.done {
            self.close();
            return Ok(None);
        }
        let mut rows = 0;
        while let Some(r) = self.input.next()? {
            for acc in self.accumulators.iter_mut().flatten() {
                acc.accumulate(&r)?;
            }
            rows += 1;
        }
        trace!("project aggregation over {} records", rows);
        self.done = true;

        let mut out = RawRecord::with_capacity(self.accumulators.len());
        for slot in &self.accumulators {
            out.append(slot.as_ref().and_then(|acc| acc.result()));
        }
        Ok(Some(out))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        for acc in self.accumulators.iter_mut().flatten() {
            acc.reset();
        }
        self.done = false;
        self.open = true;
    }
}

/// Blocking group-by emitting one row with the group map
pub struct GroupOperator {
    inner: ProjectAggregationOperator,
}

impl GroupOperator {
    pub fn new(input: BoxedOperator, key: BoxedScalar, value: BoxedScalar) -> Self {
        let group: BoxedAggregate = Box::new(Group::new(key, value));
        Self {
            inner: ProjectAggregationOperator::new(input, vec![Some(group)]),
        }
    }
}

impl Operator for GroupOperator {
    fn open(&mut self) {
        self.inner.open();
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        self.inner.next()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn state(&self) -> bool {
        self.inner.state()
    }

    fn reset_state(&mut self) {
        self.inner.reset_state();
    }
}

/// Barrier: collects a value from every record, then emits each record with
/// the complete collection appended
pub struct AggregateOperator {
    input: BoxedOperator,
    value: BoxedScalar,
    output: VecDeque<RawRecord>,
    collected: bool,
    open: bool,
}

impl AggregateOperator {
    pub fn new(input: BoxedOperator, value: BoxedScalar) -> Self {
        Self {
            input,
            value,
            output: VecDeque::new(),
            collected: false,
            open: true,
        }
    }

    fn collect(&mut self) -> Result<()> {
        let mut rows = Vec::new();
        let mut items = Vec::new();
        while let Some(r) = self.input.next()? {
            if let Some(v) = self.value.evaluate(&r)? {
                items.push(v);
            }
            rows.push(r);
        }
        let collection = Field::Collection(CollectionField::new(items));
        for mut r in rows {
            r.append_field(collection.clone());
            self.output.push_back(r);
        }
        self.collected = true;
        Ok(())
    }
}

impl Operator for AggregateOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.collected {
            self.collect()?;
        }
        match self.output.pop_front() {
            Some(r) => Ok(Some(r)),
            None => {
                self.close();
                Ok(None)
            }
        }
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
        self.collected = false;
        self.open = true;
    }
}

/// Streaming: each record carries the collection as grown so far
pub struct StoreOperator {
    input: BoxedOperator,
    value: BoxedScalar,
    items: Vec<Field>,
    open: bool,
}

impl StoreOperator {
    pub fn new(input: BoxedOperator, value: BoxedScalar) -> Self {
        Self {
            input,
            value,
            items: Vec::new(),
            open: true,
        }
    }
}

impl Operator for StoreOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut r) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        if let Some(v) = self.value.evaluate(&r)? {
            self.items.push(v);
        }
        r.append_field(Field::Collection(CollectionField::new(self.items.clone())));
        Ok(Some(r))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn state(&self) -> bool {
        self.open
    }

    fn reset_state(&mut self) {
        self.input.reset_state();
        self.items.clear();
        self.open = true;
    }
}

/// Appends a map of named per-record values
pub struct ProjectOperator {
    input: BoxedOperator,
    projections: Vec<(String, BoxedScalar)>,
    open: bool,
}

impl ProjectOperator {
    pub fn new(input: BoxedOperator, projections: Vec<(String, BoxedScalar)>) -> Self {
        Self {
            input,
            projections,
            open: true,
        }
    }
}

impl Operator for ProjectOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(mut r) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        let mut map = MapField::new();
        for (name, f) in &self.projections {
            let value = f
                .evaluate(&r)?
                .ok_or_else(|| Error::UnresolvedValue(format!("投影 {} 在记录上没有值", name)))?;
            map.insert(Field::string(name.as_str()), value);
        }
        r.append_field(Field::Map(map));
        Ok(Some(r))
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
