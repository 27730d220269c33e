//! Mutation operators
//!
//! Each operator writes to the store first and mirrors a successful write
//! into the session cache: materialized adjacency lists, spill document ids
//! and the forward/reverse pair of every edge stay in step with what was
//! persisted. Lazy adjacency lists are never fetched just to record a write.

mod add;
mod drop;
mod update;

pub use add::{AddEOperator, AddVOperator};
pub use drop::DropOperator;
pub use update::{PropertyUpdate, UpdatePropertiesOperator};

use crate::error::{Error, Result};
use crate::graph::{Field, VertexRef};
use crate::session::GraphSession;
use crate::storage::{BulkCommand, EdgeSide};

/// Vertex a mutation refers to: a vertex field directly, otherwise the id it
/// carries looked up through the session
fn resolve_vertex(session: &GraphSession, field: Option<Field>, role: &str) -> Result<VertexRef> {
    let field = field.ok_or_else(|| Error::UnresolvedValue(format!("{} 顶点没有值", role)))?;
    if let Field::Vertex(v) = field {
        return Ok(v);
    }
    let id = field
        .vertex_id()
        .ok_or_else(|| Error::InvalidTarget(format!("{} 不是顶点引用: {}", role, field.kind())))?;
    session.vertex(&id)?.ok_or(Error::VertexNotFound(id))
}

/// Removes edge properties from the forward entry, its persisted reverse
/// mirror and every cached copy, virtual reverse entries included
fn drop_edge_properties(
    session: &GraphSession,
    src: &str,
    sink: &str,
    edge_id: &str,
    names: Vec<String>,
) -> Result<()> {
    let mut sides = vec![(src, EdgeSide::Forward)];
    if session.use_reverse_edges() {
        sides.push((sink, EdgeSide::Reverse));
    }
    for (vertex_id, side) in sides {
        let outcome = session.bulk(BulkCommand::DropEdgeProperty {
            vertex_id: vertex_id.to_string(),
            edge_id: edge_id.to_string(),
            side,
            names: names.clone(),
        })?;
        if !outcome.found {
            return Err(Error::InvariantViolation(format!(
                "边 {} 不在顶点 {} 的邻接表中",
                edge_id, vertex_id
            )));
        }
    }

    for (vertex_id, reverse) in [(src, false), (sink, true)] {
        let Some(vertex) = session.cached_vertex(vertex_id) else {
            continue;
        };
        let mut v = vertex.borrow_mut();
        if let Some(edge) = v.adjacency_for_mut(reverse).get_mut(edge_id) {
            for name in &names {
                edge.remove_property(name);
            }
        }
    }
    Ok(())
}
