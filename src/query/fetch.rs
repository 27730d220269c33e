//! Vertex source
//!
//! Pulls raw vertex documents with one remote query and emits `[vertex]`
//! records, reusing cached vertex objects.

use super::operator::Operator;
use crate::error::Result;
use crate::graph::{Field, RawRecord};
use crate::session::SessionRef;
use crate::storage::JsonQuery;
use std::collections::VecDeque;
use tracing::debug;

pub struct FetchNodeOperator {
    session: SessionRef,
    query: JsonQuery,
    buffer: VecDeque<RawRecord>,
    fetched: bool,
    open: bool,
}

impl FetchNodeOperator {
    pub fn new(session: SessionRef, query: JsonQuery) -> Self {
        Self {
            session,
            query,
            buffer: VecDeque::new(),
            fetched: false,
            open: true,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let docs = self.session.query_vertices(&self.query)?;
        debug!("fetched {} vertex documents", docs.len());
        for doc in &docs {
            let vertex = self.session.vertex_from_document(doc)?;
            self.buffer.push_back(RawRecord::single(Field::Vertex(vertex)));
        }
        self.fetched = true;
        Ok(())
    }
}

impl Operator for FetchNodeOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        if !self.fetched {
            self.fetch()?;
        }
        match self.buffer.pop_front() {
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
        self.buffer.clear();
        self.fetched = false;
        self.open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::drain;
    use crate::storage::QueryPredicate;
    use crate::testing::TestGraph;
    use std::rc::Rc;

    #[test]
    fn test_fetch_reuses_cached_vertices() {
        let graph = TestGraph::chain(&["a", "b", "c"]);
        let query =
            JsonQuery::new("node").with_predicate(QueryPredicate::LabelEquals("node".to_string()));
        let mut op = FetchNodeOperator::new(graph.session.clone(), query);

        let first = drain(&mut op).unwrap();
        assert_eq!(first.len(), 3);

        op.reset_state();
        let second = drain(&mut op).unwrap();
        for (x, y) in first.iter().zip(second.iter()) {
            let (Some(Field::Vertex(a)), Some(Field::Vertex(b))) = (x.get(0), y.get(0)) else {
                panic!("expected vertices");
            };
            assert!(Rc::ptr_eq(a, b));
        }
        assert_eq!(graph.store.requests().vertex_queries, 2);
    }
}
