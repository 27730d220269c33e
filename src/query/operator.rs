//! Operator protocol
//!
//! Physical operators form a tree and are pulled one record at a time:
//! 1. `open()` - arm for iteration
//! 2. `next()` - produce the next record, `None` once exhausted
//! 3. `close()` - mark exhausted (idempotent)
//!
//! `reset_state()` clears every buffer, counter and child position and
//! re-arms the operator. Control-flow operators rely on it to replay a
//! sub-pipeline after pushing a new record into its [`ContextSource`].

use crate::error::Result;
use crate::graph::RawRecord;
use std::cell::RefCell;
use std::rc::Rc;

/// Pull-based physical operator
pub trait Operator {
    /// Arm the operator for iteration
    fn open(&mut self);

    /// Next record, or `None` when exhausted.
    ///
    /// Once exhausted, keeps returning `None` until `reset_state()`.
    fn next(&mut self) -> Result<Option<RawRecord>>;

    /// Mark the operator exhausted
    fn close(&mut self);

    /// `true` until `close()` has been called
    fn state(&self) -> bool;

    /// Clear accumulated state, reset children and re-arm
    fn reset_state(&mut self);
}

pub type BoxedOperator = Box<dyn Operator>;

impl<O: Operator + ?Sized> Operator for Box<O> {
    fn open(&mut self) {
        (**self).open()
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        (**self).next()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> bool {
        (**self).state()
    }

    fn reset_state(&mut self) {
        (**self).reset_state()
    }
}

/// Pull every remaining record out of an operator
pub fn drain(op: &mut dyn Operator) -> Result<Vec<RawRecord>> {
    let mut out = Vec::new();
    while let Some(r) = op.next()? {
        out.push(r);
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct ContextState {
    records: Vec<RawRecord>,
    position: usize,
    open: bool,
}

/// Source a sub-pipeline reads its context from.
///
/// Clones share the same slot: the parent keeps one handle to push
/// records, the sub-pipeline owns another as its leaf operator. Holds a
/// single record (`set_context`) or a bucket of them (`set_bucket`).
#[derive(Debug, Clone, Default)]
pub struct ContextSource {
    state: Rc<RefCell<ContextState>>,
}

impl ContextSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with a single record and rewind
    pub fn set_context(&self, record: RawRecord) {
        self.set_bucket(vec![record]);
    }

    /// Replace the slot with a list of records and rewind
    pub fn set_bucket(&self, records: Vec<RawRecord>) {
        let mut state = self.state.borrow_mut();
        state.records = records;
        state.position = 0;
        state.open = true;
    }

    pub fn clear(&self) {
        self.set_bucket(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().records.is_empty()
    }

    /// A boxed handle sharing this slot, for use as a pipeline leaf
    pub fn boxed(&self) -> BoxedOperator {
        Box::new(self.clone())
    }
}

impl Operator for ContextSource {
    fn open(&mut self) {
        self.state.borrow_mut().open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Ok(None);
        }
        if state.position < state.records.len() {
            let r = state.records[state.position].clone();
            state.position += 1;
            return Ok(Some(r));
        }
        state.open = false;
        Ok(None)
    }

    fn close(&mut self) {
        self.state.borrow_mut().open = false;
    }

    fn state(&self) -> bool {
        self.state.borrow().open
    }

    /// Rewinds without forgetting the records
    fn reset_state(&mut self) {
        let mut state = self.state.borrow_mut();
        state.position = 0;
        state.open = true;
    }
}

/// Keeps records for which the predicate holds
pub struct FilterOperator {
    input: BoxedOperator,
    predicate: Box<dyn super::BooleanFunction>,
    open: bool,
}

impl FilterOperator {
    pub fn new(input: BoxedOperator, predicate: Box<dyn super::BooleanFunction>) -> Self {
        Self {
            input,
            predicate,
            open: true,
        }
    }
}

impl Operator for FilterOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        while let Some(r) = self.input.next()? {
            if self.predicate.evaluate(&r)? {
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
        self.open = true;
    }
}

/// Emits records whose position falls in `[low, high)`; `high = -1` is unbounded
pub struct RangeOperator {
    input: BoxedOperator,
    low: i64,
    high: i64,
    count: i64,
    open: bool,
}

impl RangeOperator {
    pub fn new(input: BoxedOperator, low: i64, high: i64) -> Self {
        Self {
            input,
            low,
            high,
            count: 0,
            open: true,
        }
    }

    pub fn limit(input: BoxedOperator, n: i64) -> Self {
        Self::new(input, 0, n)
    }
}

impl Operator for RangeOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            if self.high >= 0 && self.count >= self.high {
                break;
            }
            let Some(r) = self.input.next()? else {
                break;
            };
            let position = self.count;
            self.count += 1;
            if position >= self.low {
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
        self.count = 0;
        self.open = true;
    }
}

/// Positional projection; out-of-range columns become null
pub struct ProjectColumnsOperator {
    input: BoxedOperator,
    columns: Vec<usize>,
    open: bool,
}

impl ProjectColumnsOperator {
    pub fn new(input: BoxedOperator, columns: Vec<usize>) -> Self {
        Self {
            input,
            columns,
            open: true,
        }
    }
}

impl Operator for ProjectColumnsOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        match self.input.next()? {
            Some(r) => Ok(Some(r.project(&self.columns))),
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
        self.open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Field;
    use crate::query::{ColumnValue, ComparisonFunction, Constant};
    use crate::types::ComparisonOp;

    fn rows(values: &[i64]) -> Vec<RawRecord> {
        values
            .iter()
            .map(|v| RawRecord::single(Field::long(*v)))
            .collect()
    }

    fn source(values: &[i64]) -> ContextSource {
        let src = ContextSource::new();
        src.set_bucket(rows(values));
        src
    }

    fn firsts(records: &[RawRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.get(0).map(|f| f.to_value()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_single_slot_context_source() {
        let ctx = ContextSource::new();
        let r = RawRecord::single(Field::string("R"));
        ctx.set_context(r);

        let mut op = ctx.boxed();
        assert_eq!(op.next().unwrap().unwrap().values(), vec![Some("R".to_string())]);
        assert!(op.next().unwrap().is_none());
        assert!(op.next().unwrap().is_none());

        op.reset_state();
        assert_eq!(op.next().unwrap().unwrap().values(), vec![Some("R".to_string())]);
    }

    #[test]
    fn test_context_source_clones_share_slot() {
        let ctx = ContextSource::new();
        let mut leaf = ctx.boxed();

        ctx.set_context(RawRecord::single(Field::string("a")));
        assert_eq!(drain(leaf.as_mut()).unwrap().len(), 1);

        ctx.set_bucket(rows(&[1, 2, 3]));
        leaf.reset_state();
        assert_eq!(drain(leaf.as_mut()).unwrap().len(), 3);
    }

    #[test]
    fn test_filter_and_replay() {
        let predicate = ComparisonFunction::new(
            Box::new(ColumnValue::new(0)),
            Box::new(Constant::new(Field::long(2))),
            ComparisonOp::GreaterThan,
        );
        let mut op = FilterOperator::new(source(&[1, 3, 2, 5]).boxed(), Box::new(predicate));

        let first = drain(&mut op).unwrap();
        assert_eq!(firsts(&first), vec!["3", "5"]);
        assert!(!op.state());

        op.reset_state();
        let second = drain(&mut op).unwrap();
        assert_eq!(firsts(&first), firsts(&second));
    }

    #[test]
    fn test_range_window() {
        let mut op = RangeOperator::new(source(&[0, 1, 2, 3, 4]).boxed(), 1, 3);
        assert_eq!(firsts(&drain(&mut op).unwrap()), vec!["1", "2"]);

        let mut unbounded = RangeOperator::new(source(&[0, 1, 2]).boxed(), 1, -1);
        assert_eq!(firsts(&drain(&mut unbounded).unwrap()), vec!["1", "2"]);

        let mut limit = RangeOperator::limit(source(&[7, 8, 9]).boxed(), 1);
        assert_eq!(firsts(&drain(&mut limit).unwrap()), vec!["7"]);
        limit.reset_state();
        assert_eq!(firsts(&drain(&mut limit).unwrap()), vec!["7"]);
    }

    #[test]
    fn test_project_columns() {
        let ctx = ContextSource::new();
        ctx.set_context(RawRecord::from_fields(vec![
            Some(Field::string("a")),
            Some(Field::string("b")),
        ]));
        let mut op = ProjectColumnsOperator::new(ctx.boxed(), vec![1, 5]);
        let out = drain(&mut op).unwrap();
        assert_eq!(out[0].values(), vec![Some("b".to_string()), None]);
    }
}
