//! Iteration
//!
//! `RepeatOperator` drives an inner sub-pipeline round by round. Each input
//! record seeds one state (a projection of its columns); every round feeds
//! all live states into the inner pipeline's [`ContextSource`] and collects
//! the states it produces. Output records are the input record followed by
//! a state.
//!
//! Two queues hold the states of the previous and the current round; they
//! are swapped once a round completes so that neither is mutated while
//! being read.

use super::function::BoxedBoolean;
use super::operator::{BoxedOperator, ContextSource, Operator};
use crate::error::Result;
use crate::graph::RawRecord;
use std::collections::VecDeque;
use std::mem;
use tracing::trace;

/// How iteration terminates
pub enum RepeatMode {
    /// A fixed number of rounds; `0` behaves as `1`
    Times(usize),
    /// Until a produced state satisfies the predicate
    Until(BoxedBoolean),
}

pub struct RepeatOperator {
    input: BoxedOperator,
    /// Input columns forming the initial state
    initial_columns: Vec<usize>,
    context: ContextSource,
    inner: BoxedOperator,
    mode: RepeatMode,
    emit: Option<BoxedBoolean>,
    /// Test the initial state against `emit` before the first round
    emit_context: bool,
    /// while-do: the initial state is eligible as round 0
    start_from_context: bool,
    prior_states: VecDeque<RawRecord>,
    new_states: VecDeque<RawRecord>,
    output: VecDeque<RawRecord>,
    open: bool,
}

impl RepeatOperator {
    pub fn new(
        input: BoxedOperator,
        initial_columns: Vec<usize>,
        context: ContextSource,
        inner: BoxedOperator,
        mode: RepeatMode,
    ) -> Self {
        let mode = match mode {
            RepeatMode::Times(0) => RepeatMode::Times(1),
            other => other,
        };
        Self {
            input,
            initial_columns,
            context,
            inner,
            mode,
            emit: None,
            emit_context: false,
            start_from_context: false,
            prior_states: VecDeque::new(),
            new_states: VecDeque::new(),
            output: VecDeque::new(),
            open: true,
        }
    }

    pub fn with_emit(mut self, emit: BoxedBoolean, emit_context: bool) -> Self {
        self.emit = Some(emit);
        self.emit_context = emit_context;
        self
    }

    /// Evaluate the termination predicate on the initial state (while-do)
    pub fn start_from_context(mut self) -> Self {
        self.start_from_context = true;
        self
    }

    fn should_emit(&self, state: &RawRecord) -> Result<bool> {
        match &self.emit {
            Some(p) => p.evaluate(state),
            None => Ok(false),
        }
    }

    /// Feed the prior round into the inner pipeline and collect the next one
    fn run_round(&mut self) -> Result<()> {
        let states: Vec<RawRecord> = self.prior_states.drain(..).collect();
        self.context.set_bucket(states);
        self.inner.reset_state();
        while let Some(state) = self.inner.next()? {
            self.new_states.push_back(state);
        }
        Ok(())
    }

    fn swap_queues(&mut self) {
        mem::swap(&mut self.prior_states, &mut self.new_states);
        self.new_states.clear();
    }

    fn iterate_times(&mut self, record: &RawRecord, rounds: usize) -> Result<()> {
        for round in 0..rounds {
            if self.prior_states.is_empty() {
                break;
            }
            self.run_round()?;
            trace!("repeat round {}: {} states", round + 1, self.new_states.len());
            if self.emit.is_some() {
                for state in &self.new_states {
                    if self.should_emit(state)? {
                        self.output.push_back(record.concat(state));
                    }
                }
            }
            self.swap_queues();
        }
        if self.emit.is_none() {
            for state in self.prior_states.drain(..) {
                self.output.push_back(record.concat(&state));
            }
        }
        self.prior_states.clear();
        Ok(())
    }

    /// Emit terminating states and drop them; keep the rest for another round
    fn sift(
        &mut self,
        record: &RawRecord,
        states: Vec<RawRecord>,
        until: &BoxedBoolean,
    ) -> Result<Vec<RawRecord>> {
        let mut live = Vec::with_capacity(states.len());
        for state in states {
            if until.evaluate(&state)? {
                self.output.push_back(record.concat(&state));
            } else {
                if self.should_emit(&state)? {
                    self.output.push_back(record.concat(&state));
                }
                live.push(state);
            }
        }
        Ok(live)
    }

    fn iterate_until(&mut self, record: &RawRecord, until: &BoxedBoolean) -> Result<()> {
        let mut round = 0;
        while !self.prior_states.is_empty() {
            self.run_round()?;
            round += 1;
            let produced: Vec<RawRecord> = self.new_states.drain(..).collect();
            trace!("repeat round {}: {} states", round, produced.len());
            let live = self.sift(record, produced, until)?;
            self.new_states.extend(live);
            self.swap_queues();
        }
        Ok(())
    }

    fn process(&mut self, record: RawRecord) -> Result<()> {
        let initial = record.project(&self.initial_columns);
        self.prior_states.clear();
        self.new_states.clear();

        let mode = mem::replace(&mut self.mode, RepeatMode::Times(1));
        let result = self.process_with(&record, initial, &mode);
        self.mode = mode;
        result
    }

    fn process_with(
        &mut self,
        record: &RawRecord,
        initial: RawRecord,
        mode: &RepeatMode,
    ) -> Result<()> {
        match mode {
            RepeatMode::Times(n) => {
                if self.emit_context && self.should_emit(&initial)? {
                    self.output.push_back(record.concat(&initial));
                }
                self.prior_states.push_back(initial);
                self.iterate_times(record, *n)
            }
            RepeatMode::Until(until) => {
                if self.start_from_context && until.evaluate(&initial)? {
                    self.output.push_back(record.concat(&initial));
                } else {
                    if self.emit_context && self.should_emit(&initial)? {
                        self.output.push_back(record.concat(&initial));
                    }
                    self.prior_states.push_back(initial);
                }
                self.iterate_until(record, until)
            }
        }
    }
}

impl Operator for RepeatOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            if let Some(r) = self.output.pop_front() {
                return Ok(Some(r));
            }
            match self.input.next()? {
                Some(record) => self.process(record)?,
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
        self.inner.reset_state();
        self.prior_states.clear();
        self.new_states.clear();
        self.output.clear();
        self.open = true;
    }
}
