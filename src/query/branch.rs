//! Branching operators
//!
//! Every branch is a sub-pipeline reading from a [`ContextSource`]. The
//! operator pushes records into the source, calls `reset_state()` on the
//! branch and drains it. Branch records are emitted unchanged.

use super::compare::compare_fields;
use super::function::{BoxedBoolean, BoxedScalar};
use super::operator::{drain, BoxedOperator, ContextSource, Operator};
use crate::error::Result;
use crate::graph::{Field, RawRecord};
use crate::types::ComparisonOp;
use std::collections::VecDeque;
use tracing::trace;

/// Union of branches.
///
/// Blocking: the whole input is buffered into the context, then each branch
/// is drained over all of it in declared order.
pub struct UnionOperator {
    input: BoxedOperator,
    context: ContextSource,
    branches: Vec<BoxedOperator>,
    output: VecDeque<RawRecord>,
    evaluated: bool,
    open: bool,
}

impl UnionOperator {
    pub fn new(input: BoxedOperator, context: ContextSource, branches: Vec<BoxedOperator>) -> Self {
        Self {
            input,
            context,
            branches,
            output: VecDeque::new(),
            evaluated: false,
            open: true,
        }
    }

    fn evaluate(&mut self) -> Result<()> {
        // no branches: upstream still runs for its side effects
        let records = drain(self.input.as_mut())?;
        trace!("union: {} records over {} branches", records.len(), self.branches.len());
        for branch in self.branches.iter_mut() {
            self.context.set_bucket(records.clone());
            branch.reset_state();
            self.output.extend(drain(branch.as_mut())?);
        }
        self.evaluated = true;
        Ok(())
    }
}

impl Operator for UnionOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.evaluated {
            self.evaluate()?;
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
        for branch in self.branches.iter_mut() {
            branch.reset_state();
        }
        self.output.clear();
        self.evaluated = false;
        self.open = true;
    }
}

/// First branch producing anything wins, per input record
pub struct CoalesceOperator {
    input: BoxedOperator,
    context: ContextSource,
    branches: Vec<BoxedOperator>,
    output: VecDeque<RawRecord>,
    open: bool,
}

impl CoalesceOperator {
    pub fn new(input: BoxedOperator, context: ContextSource, branches: Vec<BoxedOperator>) -> Self {
        Self {
            input,
            context,
            branches,
            output: VecDeque::new(),
            open: true,
        }
    }

    fn evaluate(&mut self, record: &RawRecord) -> Result<()> {
        for (i, branch) in self.branches.iter_mut().enumerate() {
            self.context.set_context(record.clone());
            branch.reset_state();
            let results = drain(branch.as_mut())?;
            if !results.is_empty() {
                trace!("coalesce: branch {} produced {} records", i, results.len());
                self.output.extend(results);
                break;
            }
        }
        Ok(())
    }
}

impl Operator for CoalesceOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            if let Some(r) = self.output.pop_front() {
                return Ok(Some(r));
            }
            match self.input.next()? {
                Some(record) => self.evaluate(&record)?,
                None => break,
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
        for branch in self.branches.iter_mut() {
            branch.reset_state();
        }
        self.output.clear();
        self.open = true;
    }
}

/// A branch with its own context source
pub struct Branch {
    pub context: ContextSource,
    pub pipeline: BoxedOperator,
}

impl Branch {
    pub fn new(context: ContextSource, pipeline: BoxedOperator) -> Self {
        Self { context, pipeline }
    }

    fn run(&mut self, bucket: Vec<RawRecord>) -> Result<Vec<RawRecord>> {
        if bucket.is_empty() {
            return Ok(Vec::new());
        }
        self.context.set_bucket(bucket);
        self.pipeline.reset_state();
        drain(self.pipeline.as_mut())
    }
}

/// Binary choose.
///
/// Blocking: the whole input is partitioned by the predicate first, then the
/// true branch is drained before the false branch.
pub struct ChooseOperator {
    input: BoxedOperator,
    predicate: BoxedBoolean,
    true_branch: Branch,
    false_branch: Branch,
    output: VecDeque<RawRecord>,
    evaluated: bool,
    open: bool,
}

impl ChooseOperator {
    pub fn new(
        input: BoxedOperator,
        predicate: BoxedBoolean,
        true_branch: Branch,
        false_branch: Branch,
    ) -> Self {
        Self {
            input,
            predicate,
            true_branch,
            false_branch,
            output: VecDeque::new(),
            evaluated: false,
            open: true,
        }
    }

    fn evaluate(&mut self) -> Result<()> {
        let mut true_bucket = Vec::new();
        let mut false_bucket = Vec::new();
        while let Some(r) = self.input.next()? {
            if self.predicate.evaluate(&r)? {
                true_bucket.push(r);
            } else {
                false_bucket.push(r);
            }
        }
        trace!("choose: {} true, {} false", true_bucket.len(), false_bucket.len());
        self.output.extend(self.true_branch.run(true_bucket)?);
        self.output.extend(self.false_branch.run(false_bucket)?);
        self.evaluated = true;
        Ok(())
    }
}

impl Operator for ChooseOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.evaluated {
            self.evaluate()?;
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
        self.true_branch.pipeline.reset_state();
        self.false_branch.pipeline.reset_state();
        self.output.clear();
        self.evaluated = false;
        self.open = true;
    }
}

/// Choose over value-keyed options, with an optional `none` branch for
/// records matching no option. Branches drain in declared order, `none` last.
pub struct ChooseWithOptionsOperator {
    input: BoxedOperator,
    selector: BoxedScalar,
    options: Vec<(Field, Branch)>,
    none: Option<Branch>,
    output: VecDeque<RawRecord>,
    evaluated: bool,
    open: bool,
}

impl ChooseWithOptionsOperator {
    pub fn new(input: BoxedOperator, selector: BoxedScalar) -> Self {
        Self {
            input,
            selector,
            options: Vec::new(),
            none: None,
            output: VecDeque::new(),
            evaluated: false,
            open: true,
        }
    }

    pub fn with_option(mut self, value: Field, branch: Branch) -> Self {
        self.options.push((value, branch));
        self
    }

    pub fn with_none(mut self, branch: Branch) -> Self {
        self.none = Some(branch);
        self
    }

    fn option_index(&self, value: &Option<Field>) -> Result<Option<usize>> {
        let Some(value) = value else {
            return Ok(None);
        };
        for (i, (key, _)) in self.options.iter().enumerate() {
            if compare_fields(value, key, ComparisonOp::Equal)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn evaluate(&mut self) -> Result<()> {
        let mut buckets: Vec<Vec<RawRecord>> = vec![Vec::new(); self.options.len()];
        let mut unmatched = Vec::new();
        while let Some(r) = self.input.next()? {
            let value = self.selector.evaluate(&r)?;
            match self.option_index(&value)? {
                Some(i) => buckets[i].push(r),
                None => unmatched.push(r),
            }
        }

        for ((_, branch), bucket) in self.options.iter_mut().zip(buckets) {
            self.output.extend(branch.run(bucket)?);
        }
        if let Some(none) = self.none.as_mut() {
            self.output.extend(none.run(unmatched)?);
        }
        self.evaluated = true;
        Ok(())
    }
}

impl Operator for ChooseWithOptionsOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.evaluated {
            self.evaluate()?;
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
        for (_, branch) in self.options.iter_mut() {
            branch.pipeline.reset_state();
        }
        if let Some(none) = self.none.as_mut() {
            none.pipeline.reset_state();
        }
        self.output.clear();
        self.evaluated = false;
        self.open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ColumnValue, ComparisonFunction, Constant, FilterOperator};
    use crate::testing::{column, values_source};

    fn greater_than(n: i64) -> BoxedBoolean {
        Box::new(ComparisonFunction::new(
            Box::new(ColumnValue::new(0)),
            Box::new(Constant::new(Field::long(n))),
            ComparisonOp::GreaterThan,
        ))
    }

    fn never() -> BoxedBoolean {
        Box::new(ComparisonFunction::new(
            Box::new(ColumnValue::new(0)),
            Box::new(Constant::new(Field::string("never"))),
            ComparisonOp::Equal,
        ))
    }

    fn passthrough() -> Branch {
        let ctx = ContextSource::new();
        Branch::new(ctx.clone(), ctx.boxed())
    }

    #[test]
    fn test_union_branch_order() {
        let ctx = ContextSource::new();
        let branches: Vec<BoxedOperator> = vec![
            ctx.boxed(),
            Box::new(FilterOperator::new(ctx.boxed(), greater_than(1))),
        ];
        let mut op = UnionOperator::new(values_source(&["1", "2"]).boxed(), ctx, branches);
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["1", "2", "2"]);
    }

    #[test]
    fn test_union_exhausts_each_branch_before_the_next() {
        let ctx = ContextSource::new();
        let branches: Vec<BoxedOperator> = vec![
            ctx.boxed(),
            Box::new(FilterOperator::new(ctx.boxed(), greater_than(0))),
        ];
        let mut op = UnionOperator::new(values_source(&["1", "2"]).boxed(), ctx, branches);
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["1", "2", "1", "2"]);

        op.reset_state();
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["1", "2", "1", "2"]);
    }

    #[test]
    fn test_union_without_branches_drains_input() {
        let src = values_source(&["1", "2", "3"]);
        let mut op = UnionOperator::new(src.boxed(), ContextSource::new(), Vec::new());
        assert!(drain(&mut op).unwrap().is_empty());
        assert!(!src.state());
    }

    #[test]
    fn test_coalesce_short_circuits() {
        let ctx = ContextSource::new();
        let branches: Vec<BoxedOperator> = vec![
            Box::new(FilterOperator::new(ctx.boxed(), never())),
            ctx.boxed(),
        ];
        let mut op = CoalesceOperator::new(values_source(&["x"]).boxed(), ctx, branches);
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["x"]);

        let ctx = ContextSource::new();
        let branches: Vec<BoxedOperator> = vec![ctx.boxed(), ctx.boxed()];
        let mut op = CoalesceOperator::new(values_source(&["y"]).boxed(), ctx, branches);
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["y"]);
    }

    #[test]
    fn test_choose_drains_true_bucket_first() {
        let src = values_source(&["1", "2", "3", "4", "5"]);
        let mut op = ChooseOperator::new(
            src.boxed(),
            greater_than(2),
            passthrough(),
            passthrough(),
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(column(&out, 0), vec!["3", "4", "5", "1", "2"]);

        op.reset_state();
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["3", "4", "5", "1", "2"]);
    }

    #[test]
    fn test_choose_with_options_order() {
        let src = values_source(&["a", "b", "c", "a", "d"]);
        let mut op = ChooseWithOptionsOperator::new(src.boxed(), Box::new(ColumnValue::new(0)))
            .with_option(Field::string("b"), passthrough())
            .with_option(Field::string("a"), passthrough())
            .with_none(passthrough());
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["b", "a", "a", "c", "d"]);

        // without a none branch unmatched records are dropped
        let src = values_source(&["a", "c"]);
        let mut op = ChooseWithOptionsOperator::new(src.boxed(), Box::new(ColumnValue::new(0)))
            .with_option(Field::string("a"), passthrough());
        assert_eq!(column(&drain(&mut op).unwrap(), 0), vec!["a"]);
    }
}
