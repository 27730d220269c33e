//! Drop
//!
//! Consumes its whole input and emits nothing. The target column may hold a
//! vertex, an edge, or any of the property kinds.

use super::drop_edge_properties;
use crate::error::{Error, Result};
use crate::graph::{
    EdgePropertyField, Field, PropertyField, RawRecord, ValuePropertyField, VertexPropertyField,
    VertexRef, VertexSinglePropertyField,
};
use crate::query::operator::{BoxedOperator, Operator};
use crate::session::SessionRef;
use crate::storage::{BulkCommand, BulkOutcome, EdgeSide};
use tracing::debug;

pub struct DropOperator {
    session: SessionRef,
    input: BoxedOperator,
    column: usize,
    open: bool,
}

impl DropOperator {
    pub fn new(session: SessionRef, input: BoxedOperator, column: usize) -> Self {
        Self {
            session,
            input,
            column,
            open: true,
        }
    }

    fn drop_field(&self, field: &Field) -> Result<()> {
        match field {
            Field::Vertex(v) => self.drop_vertex(v),
            Field::Edge(e) => self.drop_edge(e.src_id(), e.sink_id(), e.id()),
            Field::Property(PropertyField::VertexSingle(p)) => self.drop_single_property(p),
            Field::Property(PropertyField::Vertex(p)) => self.drop_vertex_property(p),
            Field::Property(PropertyField::Edge(p)) => self.drop_edge_property(p),
            Field::Property(PropertyField::Meta(m)) => self.drop_meta_property(m),
            other => Err(Error::InvalidTarget(format!("drop 不支持 {}", other.kind()))),
        }
    }

    /// Every incident edge goes through the edge path first; the document is
    /// deleted and the vertex evicted only once both lists are empty.
    fn drop_vertex(&self, vertex: &VertexRef) -> Result<()> {
        let id = vertex.borrow().id().to_string();
        self.session.ensure_adjacency_fetched(&[id.clone()])?;

        let outgoing = vertex.borrow().adjacency().edge_ids();
        for edge_id in outgoing {
            let sink = vertex
                .borrow()
                .adjacency()
                .get(&edge_id)
                .map(|e| e.sink_id().to_string());
            if let Some(sink) = sink {
                self.drop_edge(&id, &sink, &edge_id)?;
            }
        }

        // self-loops are gone from the reverse list by now
        let incoming = vertex.borrow().reverse_adjacency().edge_ids();
        for edge_id in incoming {
            let src = vertex
                .borrow()
                .reverse_adjacency()
                .get(&edge_id)
                .map(|e| e.src_id().to_string());
            if let Some(src) = src {
                self.drop_edge(&src, &id, &edge_id)?;
            }
        }

        let partition_key = vertex.borrow().partition_key().to_string();
        self.session.write_document(&id, None, &partition_key)?;
        self.session.evict_vertex(&id)?;
        debug!("drop: vertex {}", id);
        Ok(())
    }

    fn drop_edge(&self, src: &str, sink: &str, edge_id: &str) -> Result<()> {
        let forward = self.session.remove_edge(src, edge_id, EdgeSide::Forward)?;
        check_removed(&forward, edge_id, src, sink)?;
        if let Some(v) = self.session.cached_vertex(src) {
            v.borrow_mut().adjacency_mut().remove(edge_id);
        }

        if self.session.use_reverse_edges() {
            let reverse = self.session.remove_edge(sink, edge_id, EdgeSide::Reverse)?;
            check_removed(&reverse, edge_id, sink, src)?;
        }
        // the cached reverse entry is real or virtual; either way it goes
        if let Some(v) = self.session.cached_vertex(sink) {
            v.borrow_mut().reverse_adjacency_mut().remove(edge_id);
        }
        debug!("drop: edge {} {} -> {}", edge_id, src, sink);
        Ok(())
    }

    fn drop_single_property(&self, p: &VertexSinglePropertyField) -> Result<()> {
        let outcome = self.session.bulk(BulkCommand::DropVertexSingleProperty {
            vertex_id: p.vertex_id.clone(),
            name: p.name.clone(),
            property_id: p.property_id.clone(),
        })?;
        let Some(vertex) = self.session.cached_vertex(&p.vertex_id) else {
            return Ok(());
        };
        if !outcome.found {
            let cached = vertex
                .borrow()
                .property(&p.name)
                .map_or(false, |prop| prop.values.contains_key(&p.property_id));
            if cached {
                return Err(Error::InvariantViolation(format!(
                    "缓存中有属性 {}#{}，存储中却没有",
                    p.name, p.property_id
                )));
            }
            return Ok(());
        }
        vertex
            .borrow_mut()
            .remove_single_property(&p.name, &p.property_id);
        Ok(())
    }

    fn drop_vertex_property(&self, p: &VertexPropertyField) -> Result<()> {
        let Some(vertex_id) = p.first().map(|s| s.vertex_id.clone()) else {
            return Ok(());
        };
        self.session.bulk(BulkCommand::DropVertexProperty {
            vertex_id: vertex_id.clone(),
            name: p.name.clone(),
        })?;
        if let Some(v) = self.session.cached_vertex(&vertex_id) {
            v.borrow_mut().remove_property(&p.name);
        }
        Ok(())
    }

    fn drop_edge_property(&self, p: &EdgePropertyField) -> Result<()> {
        drop_edge_properties(
            &self.session,
            &p.src_id,
            &p.sink_id,
            &p.edge_id,
            vec![p.name.clone()],
        )
    }

    fn drop_meta_property(&self, m: &ValuePropertyField) -> Result<()> {
        self.session
            .bulk(BulkCommand::DropVertexSinglePropertyMetaProperty {
                vertex_id: m.vertex_id.clone(),
                name: m.parent_name.clone(),
                property_id: m.parent_property_id.clone(),
                meta_name: m.name.clone(),
            })?;
        if let Some(v) = self.session.cached_vertex(&m.vertex_id) {
            if let Some(single) = v
                .borrow_mut()
                .single_property_mut(&m.parent_name, &m.parent_property_id)
            {
                single.meta.shift_remove(&m.name);
            }
        }
        Ok(())
    }
}

/// The store must have held the entry, and its far end must be the vertex
/// the cache expects
fn check_removed(
    outcome: &BulkOutcome,
    edge_id: &str,
    owner: &str,
    expected_other: &str,
) -> Result<()> {
    if !outcome.found {
        return Err(Error::InvariantViolation(format!(
            "边 {} 不在顶点 {} 的邻接表中",
            edge_id, owner
        )));
    }
    if outcome.other_vertex_id.as_deref() != Some(expected_other) {
        return Err(Error::InvariantViolation(format!(
            "边 {} 的另一端是 {:?}，预期 {}",
            edge_id, outcome.other_vertex_id, expected_other
        )));
    }
    Ok(())
}

impl Operator for DropOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        while self.open {
            let Some(record) = self.input.next()? else {
                break;
            };
            if let Some(field) = record.get(self.column) {
                self.drop_field(field)?;
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
