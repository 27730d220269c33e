//! One-hop traversal join
//!
//! A nested-loop join whose outer relation is buffered per batch and whose
//! inner relation is fetched remotely: every distinct sink id in the batch
//! is looked up with `alias.id IN (...)` queries bounded by `max_in_list`,
//! results are grouped by id, then joined back against the batch in input
//! order.

use super::compare::scalar_values;
use super::function::property_of;
use super::operator::{BoxedOperator, Operator};
use crate::error::Result;
use crate::graph::{Field, RawRecord, VertexRef};
use crate::session::SessionRef;
use crate::storage::JsonQuery;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

/// Id a field refers to when used as a traversal sink
pub fn sink_reference(field: &Field) -> Option<String> {
    match field {
        Field::Edge(e) => Some(e.other_vertex_id().to_string()),
        other => other.vertex_id(),
    }
}

pub struct TraversalOperator {
    session: SessionRef,
    input: BoxedOperator,
    /// Column holding the sink reference
    sink_column: usize,
    query: JsonQuery,
    /// Append the sink id instead of fetching the vertex
    sink_id_only: bool,
    /// Extra equality keys: (record column, sink vertex property)
    join_keys: Vec<(usize, String)>,
    output: VecDeque<RawRecord>,
    input_exhausted: bool,
    open: bool,
}

impl TraversalOperator {
    pub fn new(
        session: SessionRef,
        input: BoxedOperator,
        sink_column: usize,
        query: JsonQuery,
    ) -> Self {
        Self {
            session,
            input,
            sink_column,
            query,
            sink_id_only: false,
            join_keys: Vec::new(),
            output: VecDeque::new(),
            input_exhausted: false,
            open: true,
        }
    }

    pub fn sink_id_only(mut self) -> Self {
        self.sink_id_only = true;
        self
    }

    pub fn with_join_key(mut self, column: usize, property: impl Into<String>) -> Self {
        self.join_keys.push((column, property.into()));
        self
    }

    fn read_batch(&mut self) -> Result<Vec<RawRecord>> {
        let size = self.session.config().traversal_batch_size;
        let mut batch = Vec::with_capacity(size.min(1024));
        while batch.len() < size {
            match self.input.next()? {
                Some(r) => batch.push(r),
                None => {
                    self.input_exhausted = true;
                    break;
                }
            }
        }
        Ok(batch)
    }

    fn fetch_sinks(&self, ids: &[String]) -> Result<HashMap<String, Vec<VertexRef>>> {
        let max_in_list = self.session.config().max_in_list;
        let mut sinks: HashMap<String, Vec<VertexRef>> = HashMap::new();
        for chunk in ids.chunks(max_in_list) {
            trace!("IN-list chunk of {} ids", chunk.len());
            let docs = self.session.query_vertices(&self.query.with_id_in(chunk))?;
            for doc in &docs {
                let vertex = self.session.vertex_from_document(doc)?;
                let id = vertex.borrow().id().to_string();
                sinks.entry(id).or_default().push(vertex);
            }
        }
        Ok(sinks)
    }

    fn keys_match(&self, record: &RawRecord, vertex: &VertexRef) -> bool {
        let sink = Field::Vertex(vertex.clone());
        self.join_keys.iter().all(|(column, name)| {
            let (Some(left), Some(right)) = (record.get(*column), property_of(&sink, name)) else {
                return false;
            };
            let rights = scalar_values(&right);
            scalar_values(left)
                .iter()
                .any(|l| rights.iter().any(|r| l.value.eq_ignore_ascii_case(&r.value)))
        })
    }

    fn process_batch(&mut self, batch: Vec<RawRecord>) -> Result<()> {
        let refs: Vec<Option<String>> = batch
            .iter()
            .map(|r| r.get(self.sink_column).and_then(sink_reference))
            .collect();

        if self.sink_id_only {
            for (r, id) in batch.into_iter().zip(refs) {
                if let Some(id) = id {
                    let mut out = r;
                    out.append_field(Field::string(id));
                    self.output.push_back(out);
                }
            }
            return Ok(());
        }

        let mut seen = HashSet::new();
        let distinct: Vec<String> = refs
            .iter()
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if distinct.is_empty() {
            return Ok(());
        }
        debug!(
            "traversal batch: {} records, {} distinct sinks",
            batch.len(),
            distinct.len()
        );

        let sinks = self.fetch_sinks(&distinct)?;
        for (r, id) in batch.iter().zip(refs) {
            let Some(vertices) = id.and_then(|id| sinks.get(&id)) else {
                continue;
            };
            for v in vertices {
                if self.keys_match(r, v) {
                    let mut out = r.clone();
                    out.append_field(Field::Vertex(v.clone()));
                    self.output.push_back(out);
                }
            }
        }
        Ok(())
    }
}

impl Operator for TraversalOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            if let Some(r) = self.output.pop_front() {
                return Ok(Some(r));
            }
            if self.input_exhausted {
                break;
            }
            let soft_cap = self.session.config().output_soft_cap;
            while self.output.len() < soft_cap && !self.input_exhausted {
                let batch = self.read_batch()?;
                if !batch.is_empty() {
                    self.process_batch(batch)?;
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
        self.input_exhausted = false;
        self.open = true;
    }
}
