//! Adjacency list decoding
//!
//! Expands a vertex column into one record per incident edge. Each output
//! record is the input record followed by
//! `[edge, out vertex id, in vertex id, other vertex id, edge id, props...]`.
//! Lazy adjacency lists are materialized for a whole batch of input records
//! with a single construction call before anything in the batch is decoded.

use super::function::BoxedBoolean;
use super::operator::{BoxedOperator, Operator};
use crate::error::{Error, Result};
use crate::graph::{AdjacencyListField, EdgeField, Field, PropertyField, RawRecord, VertexRef};
use crate::session::SessionRef;
use crate::types::Direction;
use std::collections::VecDeque;
use tracing::trace;

/// Meta columns appended ahead of property projections
pub const EDGE_META_FIELDS: usize = 5;

pub struct AdjacencyListDecoder {
    session: SessionRef,
    input: BoxedOperator,
    vertex_column: usize,
    direction: Direction,
    edge_predicate: Option<BoxedBoolean>,
    projected_properties: Vec<String>,
    /// Width of upstream records before expansion
    input_width: usize,
    output: VecDeque<RawRecord>,
    input_exhausted: bool,
    open: bool,
}

impl AdjacencyListDecoder {
    pub fn new(
        session: SessionRef,
        input: BoxedOperator,
        vertex_column: usize,
        direction: Direction,
        input_width: usize,
    ) -> Self {
        Self {
            session,
            input,
            vertex_column,
            direction,
            edge_predicate: None,
            projected_properties: Vec::new(),
            input_width,
            output: VecDeque::new(),
            input_exhausted: false,
            open: true,
        }
    }

    pub fn with_edge_predicate(mut self, predicate: BoxedBoolean) -> Self {
        self.edge_predicate = Some(predicate);
        self
    }

    pub fn with_properties(mut self, names: Vec<String>) -> Self {
        self.projected_properties = names;
        self
    }

    pub fn target_width(&self) -> usize {
        self.input_width + EDGE_META_FIELDS + self.projected_properties.len()
    }

    fn resolve_vertex(&self, record: &RawRecord) -> Result<Option<VertexRef>> {
        match record.get(self.vertex_column) {
            Some(Field::Vertex(v)) => Ok(Some(v.clone())),
            Some(other) => match other.vertex_id() {
                Some(id) => self.session.vertex(&id),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn needs_fetch(&self, vertex: &VertexRef) -> bool {
        let v = vertex.borrow();
        (self.direction.includes_outgoing() && !v.adjacency().is_fetched())
            || (self.direction.includes_incoming() && !v.reverse_adjacency().is_fetched())
    }

    fn fill(&mut self) -> Result<()> {
        let batch_size = self.session.config().adjacency_batch_size;
        let mut batch: Vec<(RawRecord, Option<VertexRef>)> = Vec::new();
        let mut lazy_ids: Vec<String> = Vec::new();

        while batch.len() < batch_size {
            let Some(r) = self.input.next()? else {
                self.input_exhausted = true;
                break;
            };
            if r.len() == self.target_width() {
                batch.push((r, None));
                continue;
            }
            let vertex = self.resolve_vertex(&r)?;
            if let Some(v) = &vertex {
                if self.needs_fetch(v) {
                    lazy_ids.push(v.borrow().id().to_string());
                }
            }
            batch.push((r, vertex));
        }

        if !lazy_ids.is_empty() {
            trace!("materializing {} lazy adjacency lists", lazy_ids.len());
            self.session.ensure_adjacency_fetched(&lazy_ids)?;
        }

        for (r, vertex) in batch {
            match vertex {
                // already expanded upstream
                None if r.len() == self.target_width() => self.output.push_back(r),
                None => {}
                Some(v) => self.decode(&r, &v)?,
            }
        }
        Ok(())
    }

    fn decode(&mut self, record: &RawRecord, vertex: &VertexRef) -> Result<()> {
        let mut lists: Vec<(Vec<EdgeField>, bool)> = Vec::with_capacity(2);
        {
            let v = vertex.borrow();
            if self.direction.includes_outgoing() {
                lists.push((edges_of(v.adjacency(), v.id(), false)?, false));
            }
            if self.direction.includes_incoming() {
                lists.push((edges_of(v.reverse_adjacency(), v.id(), true)?, true));
            }
        }

        for (edges, reverse) in lists {
            for edge in edges {
                let other = if reverse { edge.src_id() } else { edge.sink_id() }.to_string();
                let src = edge.src_id().to_string();
                let sink = edge.sink_id().to_string();
                let id = edge.id().to_string();
                let props: Vec<Option<Field>> = self
                    .projected_properties
                    .iter()
                    .map(|name| {
                        edge.property(name)
                            .map(|p| Field::Property(PropertyField::Edge(p.clone())))
                    })
                    .collect();

                let mut expanded = record.clone();
                expanded.append_field(Field::Edge(edge));
                expanded.append_field(Field::string(src));
                expanded.append_field(Field::string(sink));
                expanded.append_field(Field::string(other));
                expanded.append_field(Field::string(id));
                for p in props {
                    expanded.append(p);
                }

                let keep = match &self.edge_predicate {
                    Some(p) => p.evaluate(&expanded)?,
                    None => true,
                };
                if keep {
                    self.output.push_back(expanded);
                }
            }
        }
        Ok(())
    }
}

fn edges_of(
    list: &AdjacencyListField,
    vertex_id: &str,
    reverse: bool,
) -> Result<Vec<EdgeField>> {
    if !list.is_fetched() {
        return Err(Error::InvariantViolation(format!(
            "{} 邻接表在物化之前被读取: {}",
            if reverse { "入" } else { "出" },
            vertex_id
        )));
    }
    Ok(list.edges().cloned().collect())
}

impl Operator for AdjacencyListDecoder {
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
            self.fill()?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::query::{drain, ComparisonFunction, Constant, PropertyValue};
    use crate::testing::{column, TestGraph};
    use crate::types::ComparisonOp;
    use serde_json::json;

    fn star(config: ExecutionConfig) -> TestGraph {
        let graph = TestGraph::new(config);
        for id in ["hub", "x", "y", "z"] {
            graph.add_vertex(id, "node", &[]);
        }
        graph.add_edge_with("e1", "knows", "hub", "x", &[("weight", json!(1))], None);
        graph.add_edge_with("e2", "knows", "hub", "y", &[("weight", json!(5))], None);
        graph.add_edge_with("e3", "knows", "z", "hub", &[("weight", json!(9))], None);
        graph
    }

    #[test]
    fn test_decode_layout() {
        let graph = star(ExecutionConfig::default());
        let mut op = AdjacencyListDecoder::new(
            graph.session.clone(),
            graph.source(&["hub"]).boxed(),
            0,
            Direction::Outgoing,
            1,
        )
        .with_properties(vec!["weight".to_string()]);
        let out = drain(&mut op).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), op.target_width());
        assert_eq!(
            out[0].values(),
            vec![
                Some("hub".to_string()),
                Some("e1".to_string()),
                Some("hub".to_string()),
                Some("x".to_string()),
                Some("x".to_string()),
                Some("e1".to_string()),
                Some("1".to_string()),
            ]
        );
    }

    #[test]
    fn test_incoming_other_vertex_and_predicate() {
        let graph = star(ExecutionConfig::default());
        let mut both = AdjacencyListDecoder::new(
            graph.session.clone(),
            graph.source(&["hub"]).boxed(),
            0,
            Direction::Both,
            1,
        );
        let out = drain(&mut both).unwrap();
        assert_eq!(column(&out, 4), vec!["x", "y", "z"]);

        let heavy = ComparisonFunction::new(
            Box::new(PropertyValue::new(1, "weight")),
            Box::new(Constant::new(Field::long(3))),
            ComparisonOp::GreaterThan,
        );
        let mut filtered = AdjacencyListDecoder::new(
            graph.session.clone(),
            graph.source(&["hub"]).boxed(),
            0,
            Direction::Both,
            1,
        )
        .with_edge_predicate(Box::new(heavy));
        let out = drain(&mut filtered).unwrap();
        assert_eq!(column(&out, 5), vec!["e2", "e3"]);
    }

    #[test]
    fn test_lazy_lists_fetched_in_one_call() {
        let writer = TestGraph::new(ExecutionConfig::default());
        for id in ["a", "b", "c", "t"] {
            writer.add_vertex(id, "node", &[]);
        }
        // threshold 1: the second edge of each vertex spills
        for (i, src) in ["a", "b", "c"].iter().enumerate() {
            writer.add_edge_with(&format!("{}1", src), "knows", src, "t", &[], Some(1));
            writer.add_edge_with(
                &format!("{}2", src),
                "knows",
                src,
                "t",
                &[("n", json!(i))],
                Some(1),
            );
        }

        let graph = writer.reopen(ExecutionConfig::default());
        let src = graph.source(&["a", "b", "c"]);
        graph.store.reset_requests();

        let mut op = AdjacencyListDecoder::new(
            graph.session.clone(),
            src.boxed(),
            0,
            Direction::Outgoing,
            1,
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(column(&out, 5), vec!["a1", "a2", "b1", "b2", "c1", "c2"]);
        assert_eq!(graph.store.requests().adjacency_constructions, 1);
    }

    #[test]
    fn test_expanded_records_pass_through() {
        let graph = star(ExecutionConfig::default());
        let src = crate::query::ContextSource::new();
        let mut wide = graph.vertex_record("hub");
        for _ in 0..EDGE_META_FIELDS {
            wide.append_field(Field::string("m"));
        }
        src.set_bucket(vec![wide.clone()]);

        let mut op = AdjacencyListDecoder::new(
            graph.session.clone(),
            src.boxed(),
            0,
            Direction::Outgoing,
            1,
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].values(), wide.values());
    }

    #[test]
    fn test_column_id_reference() {
        let graph = star(ExecutionConfig::default());
        let src = crate::testing::values_source(&["hub"]);
        let mut op = AdjacencyListDecoder::new(
            graph.session.clone(),
            src.boxed(),
            0,
            Direction::Incoming,
            1,
        );
        let out = drain(&mut op).unwrap();
        assert_eq!(column(&out, 4), vec!["z"]);
    }
}
