//! Per-record sub-pipelines
//!
//! Each operator pushes the outer record into a [`ContextSource`], resets
//! the inner pipeline and pulls from it. Inner records start with the outer
//! record's columns; only the columns past the outer width are appended.

use super::operator::{drain, BoxedOperator, ContextSource, Operator};
use crate::error::Result;
use crate::graph::RawRecord;
use std::collections::VecDeque;

fn run_inner(
    context: &ContextSource,
    inner: &mut BoxedOperator,
    record: &RawRecord,
) -> Result<Vec<RawRecord>> {
    context.set_context(record.clone());
    inner.reset_state();
    drain(inner.as_mut())
}

fn extend(outer: &RawRecord, inner: &RawRecord) -> RawRecord {
    outer.concat(&inner.tail(outer.len()))
}

/// First inner result per outer record; records without one are dropped
pub struct MapOperator {
    input: BoxedOperator,
    context: ContextSource,
    inner: BoxedOperator,
    open: bool,
}

impl MapOperator {
    pub fn new(input: BoxedOperator, context: ContextSource, inner: BoxedOperator) -> Self {
        Self {
            input,
            context,
            inner,
            open: true,
        }
    }
}

impl Operator for MapOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            let Some(record) = self.input.next()? else {
                break;
            };
            self.context.set_context(record.clone());
            self.inner.reset_state();
            if let Some(first) = self.inner.next()? {
                return Ok(Some(extend(&record, &first)));
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
        self.inner.reset_state();
        self.open = true;
    }
}

/// Every inner result, each appended to a copy of the outer record
pub struct FlatMapOperator {
    input: BoxedOperator,
    context: ContextSource,
    inner: BoxedOperator,
    output: VecDeque<RawRecord>,
    open: bool,
}

/// `local()` scoping evaluates exactly like a flat map
pub type LocalOperator = FlatMapOperator;

impl FlatMapOperator {
    pub fn new(input: BoxedOperator, context: ContextSource, inner: BoxedOperator) -> Self {
        Self {
            input,
            context,
            inner,
            output: VecDeque::new(),
            open: true,
        }
    }
}

impl Operator for FlatMapOperator {
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
            for r in run_inner(&self.context, &mut self.inner, &record)? {
                self.output.push_back(extend(&record, &r));
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
        self.inner.reset_state();
        self.output.clear();
        self.open = true;
    }
}

/// Flat map that keeps outer records whose sub-pipeline is empty.
///
/// Such records get one fallback column per entry of `fallback`: the outer
/// column at that index, or null when the index is negative.
pub struct OptionalOperator {
    input: BoxedOperator,
    context: ContextSource,
    inner: BoxedOperator,
    fallback: Vec<i64>,
    output: VecDeque<RawRecord>,
    open: bool,
}

impl OptionalOperator {
    pub fn new(
        input: BoxedOperator,
        context: ContextSource,
        inner: BoxedOperator,
        fallback: Vec<i64>,
    ) -> Self {
        Self {
            input,
            context,
            inner,
            fallback,
            output: VecDeque::new(),
            open: true,
        }
    }

    fn fallback_record(&self, record: &RawRecord) -> RawRecord {
        let mut out = record.clone();
        for &index in &self.fallback {
            let field = usize::try_from(index)
                .ok()
                .and_then(|i| record.get(i))
                .cloned();
            out.append(field);
        }
        out
    }
}

impl Operator for OptionalOperator {
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
            let results = run_inner(&self.context, &mut self.inner, &record)?;
            if results.is_empty() {
                let fallback = self.fallback_record(&record);
                self.output.push_back(fallback);
            } else {
                for r in results {
                    self.output.push_back(extend(&record, &r));
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
        self.inner.reset_state();
        self.output.clear();
        self.open = true;
    }
}

/// Drains the sub-pipeline for its effects and passes the outer record on
pub struct SideEffectOperator {
    input: BoxedOperator,
    context: ContextSource,
    inner: BoxedOperator,
    open: bool,
}

impl SideEffectOperator {
    pub fn new(input: BoxedOperator, context: ContextSource, inner: BoxedOperator) -> Self {
        Self {
            input,
            context,
            inner,
            open: true,
        }
    }
}

impl Operator for SideEffectOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        match self.input.next()? {
            Some(record) => {
                run_inner(&self.context, &mut self.inner, &record)?;
                Ok(Some(record))
            }
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
        self.inner.reset_state();
        self.open = true;
    }
}
