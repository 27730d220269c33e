//! AddV / AddE

use super::resolve_vertex;
use crate::error::{Error, Result};
use crate::graph::{EdgeField, Field, RawRecord, StringField};
use crate::query::function::BoxedScalar;
use crate::query::operator::{BoxedOperator, Operator};
use crate::session::SessionRef;
use crate::storage::document::{
    edge_to_json, is_reserved_edge_key, is_reserved_vertex_key, new_vertex_document,
    single_property_json, KEY_ETAG, KEY_ID, KEY_PARTITION,
};
use crate::storage::{BulkCommand, BulkOutcome, Document, EdgeSide};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Creates one vertex per input record and appends it.
///
/// The template document is cloned for every vertex; the fresh id doubles as
/// the partition key. The cached vertex is built from the persisted document,
/// never patched onto an existing object.
pub struct AddVOperator {
    session: SessionRef,
    input: BoxedOperator,
    template: Document,
    properties: Vec<(String, Value)>,
    open: bool,
}

impl AddVOperator {
    pub fn new(session: SessionRef, input: BoxedOperator, label: impl AsRef<str>) -> Self {
        Self {
            session,
            input,
            template: new_vertex_document("", label.as_ref()),
            properties: Vec::new(),
            open: true,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), value));
        self
    }

    fn create(&self) -> Result<Field> {
        let id = Uuid::new_v4().to_string();
        let mut doc = self.template.clone();
        doc.insert(KEY_ID.to_string(), json!(id));
        doc.insert(KEY_PARTITION.to_string(), json!(id));

        for (name, value) in &self.properties {
            if is_reserved_vertex_key(name) {
                return Err(Error::InvalidTarget(format!("保留键不能作为顶点属性: {}", name)));
            }
            let entry = single_property_json(&Uuid::new_v4().to_string(), value.clone(), &[]);
            match doc.get_mut(name).and_then(Value::as_array_mut) {
                Some(items) => items.push(entry),
                None => {
                    doc.insert(name.clone(), Value::Array(vec![entry]));
                }
            }
        }

        let outcome = self.session.bulk(BulkCommand::AddVertex {
            document: doc.clone(),
        })?;
        if let Some(etag) = outcome.etag {
            doc.insert(KEY_ETAG.to_string(), json!(etag));
        }
        debug!("addV: created vertex {}", id);
        Ok(Field::Vertex(self.session.vertex_from_document(&doc)?))
    }
}

impl Operator for AddVOperator {
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
        let vertex = self.create()?;
        r.append_field(vertex);
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

/// Creates one edge per input record and appends its forward entry.
///
/// Source and sink are scalar evaluations on the record, typically
/// correlated subqueries. The forward entry is always persisted; the reverse
/// entry is persisted only when reverse edges are enabled and is otherwise
/// cached as a virtual placeholder.
pub struct AddEOperator {
    session: SessionRef,
    input: BoxedOperator,
    src: BoxedScalar,
    sink: BoxedScalar,
    label: String,
    properties: Vec<(String, Value)>,
    open: bool,
}

impl AddEOperator {
    pub fn new(
        session: SessionRef,
        input: BoxedOperator,
        src: BoxedScalar,
        sink: BoxedScalar,
        label: impl Into<String>,
    ) -> Self {
        Self {
            session,
            input,
            src,
            sink,
            label: label.into(),
            properties: Vec::new(),
            open: true,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.push((name.into(), value));
        self
    }

    fn add(&self, record: &RawRecord) -> Result<EdgeField> {
        let src = resolve_vertex(&self.session, self.src.evaluate(record)?, "起点")?;
        let sink = resolve_vertex(&self.session, self.sink.evaluate(record)?, "终点")?;

        let mut edge = {
            let (s, t) = (src.borrow(), sink.borrow());
            EdgeField::new(Uuid::new_v4().to_string(), self.label.as_str(), s.id(), t.id())
                .with_vertex_labels(s.label(), t.label())
        };
        for (name, value) in &self.properties {
            if is_reserved_edge_key(name) {
                return Err(Error::InvalidTarget(format!("保留键不能作为边属性: {}", name)));
            }
            edge.set_property(name.as_str(), StringField::from_json(value));
        }
        let json = edge_to_json(&edge);
        let threshold = self.session.spill_threshold();

        let forward = self.session.bulk(BulkCommand::AddEdge {
            vertex_id: edge.src_id().to_string(),
            edge: json.clone(),
            side: EdgeSide::Forward,
            spill_threshold: threshold,
        })?;
        self.session.record_edge_added(&src, false, edge.clone(), &forward);

        if self.session.use_reverse_edges() {
            let reverse = self.session.bulk(BulkCommand::AddEdge {
                vertex_id: edge.sink_id().to_string(),
                edge: json,
                side: EdgeSide::Reverse,
                spill_threshold: threshold,
            })?;
            self.session
                .record_edge_added(&sink, true, edge.to_reverse(false), &reverse);
        } else {
            self.session
                .record_edge_added(&sink, true, edge.to_reverse(true), &BulkOutcome::found());
        }

        debug!(
            "addE: {} {} -> {} (doc {:?})",
            edge.id(),
            edge.src_id(),
            edge.sink_id(),
            forward.doc_id
        );
        Ok(edge.with_doc_id(forward.doc_id))
    }
}

impl Operator for AddEOperator {
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
        let edge = self.add(&r)?;
        r.append_field(Field::Edge(edge));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::query::{drain, ColumnValue, Constant, ContextSource, ScalarSubquery};
    use crate::storage::document::{inline_edges, KEY_LATEST_EDGE_DOC};
    use crate::testing::{out_hop, TestGraph};

    fn col(i: usize) -> BoxedScalar {
        Box::new(ColumnValue::new(i))
    }

    fn constant(id: &str) -> BoxedScalar {
        Box::new(Constant::new(Field::string(id)))
    }

    fn add_e(graph: &TestGraph, src: &ContextSource, sink: &str) -> AddEOperator {
        AddEOperator::new(graph.session.clone(), src.boxed(), col(0), constant(sink), "knows")
    }

    #[test]
    fn test_add_vertex_is_persisted_and_cached() {
        let graph = TestGraph::new(ExecutionConfig::default());
        let src = ContextSource::new();
        src.set_context(RawRecord::new());
        let mut op = AddVOperator::new(graph.session.clone(), src.boxed(), "person")
            .with_property("name", json!("ann"))
            .with_property("nick", json!("a"))
            .with_property("nick", json!("annie"));
        let out = drain(&mut op).unwrap();
        assert_eq!(out.len(), 1);

        let Some(Field::Vertex(v)) = out[0].get(0) else {
            panic!("expected a vertex");
        };
        let id = v.borrow().id().to_string();
        let doc = graph.store.document(&id).unwrap();
        assert_eq!(doc[KEY_PARTITION], json!(id));
        assert_eq!(doc["nick"].as_array().unwrap().len(), 2);

        let cached = graph.session.cached_vertex(&id).unwrap();
        assert!(std::rc::Rc::ptr_eq(&cached, v));
        assert_eq!(cached.borrow().property("nick").unwrap().values.len(), 2);
        assert!(graph.session.etag(&id).is_some());
    }

    #[test]
    fn test_add_vertex_rejects_reserved_property() {
        let graph = TestGraph::new(ExecutionConfig::default());
        let src = ContextSource::new();
        src.set_context(RawRecord::new());
        let mut op = AddVOperator::new(graph.session.clone(), src.boxed(), "person")
            .with_property("_edge", json!("x"));
        assert!(matches!(op.next(), Err(Error::InvalidTarget(_))));
    }

    #[test]
    fn test_add_edge_writes_both_sides() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("a", "person", &[]);
        graph.add_vertex("b", "person", &[]);
        let src = graph.source(&["a"]);
        let mut op = add_e(&graph, &src, "b").with_property("since", json!(2020));
        let out = drain(&mut op).unwrap();
        let edge = out[0].get(1).and_then(Field::as_edge).unwrap().clone();
        assert_eq!(edge.src_id(), "a");
        assert_eq!(edge.sink_id(), "b");
        assert_eq!(edge.sink_label(), "person");

        let a = graph.session.cached_vertex("a").unwrap();
        let b = graph.session.cached_vertex("b").unwrap();
        let fwd = a.borrow().adjacency().get(edge.id()).cloned().unwrap();
        let rev = b.borrow().reverse_adjacency().get(edge.id()).cloned().unwrap();
        assert_eq!(fwd.label(), rev.label());
        assert!(rev.is_reverse());
        assert!(!rev.is_virtual());
        assert_eq!(fwd.property("since").unwrap().value.to_json(), json!(2020));

        let stored_a = graph.store.document("a").unwrap();
        let stored_b = graph.store.document("b").unwrap();
        assert_eq!(inline_edges(&stored_a, EdgeSide::Forward).len(), 1);
        assert_eq!(inline_edges(&stored_b, EdgeSide::Reverse)[0]["id"], json!(edge.id()));
    }

    #[test]
    fn test_sink_from_correlated_subquery() {
        let graph = TestGraph::chain(&["a", "b"]);
        let src = graph.source(&["a"]);
        // sink = the vertex one hop out of the source
        let ctx = ContextSource::new();
        let sink = ScalarSubquery::new(ctx.clone(), out_hop(&graph.session, &ctx), None);
        let mut op = AddEOperator::new(
            graph.session.clone(),
            src.boxed(),
            col(0),
            Box::new(sink),
            "again",
        );
        let out = drain(&mut op).unwrap();
        let edge = out[0].get(1).and_then(Field::as_edge).unwrap();
        assert_eq!(edge.sink_id(), "b");
        assert_eq!(graph.session.cached_vertex("a").unwrap().borrow().adjacency().len(), 2);
    }

    #[test]
    fn test_spill_redirects_cached_edges() {
        let graph = TestGraph::new(ExecutionConfig::default().with_spill_threshold(Some(2)));
        graph.add_vertex("a", "person", &[]);
        graph.add_vertex("b", "person", &[]);
        let src = graph.source(&["a", "a", "a"]);
        let mut op = add_e(&graph, &src, "b");
        let out = drain(&mut op).unwrap();
        assert_eq!(out.len(), 3);

        let pages = graph.store.edge_pages("a", EdgeSide::Forward);
        assert_eq!(pages.len(), 1);
        let a = graph.session.cached_vertex("a").unwrap();
        let a = a.borrow();
        assert!(a.adjacency().is_fetched());
        assert_eq!(a.adjacency().len(), 3);
        assert!(a.adjacency().edges().all(|e| e.doc_id() == Some(pages[0].as_str())));
        assert_eq!(a.latest_out_edge_doc_id(), Some(pages[0].as_str()));
        assert_eq!(graph.store.document("a").unwrap()[KEY_LATEST_EDGE_DOC], json!(pages[0]));

        let reverse_pages = graph.store.edge_pages("b", EdgeSide::Reverse);
        let b = graph.session.cached_vertex("b").unwrap();
        assert!(b
            .borrow()
            .reverse_adjacency()
            .edges()
            .all(|e| e.doc_id() == Some(reverse_pages[0].as_str())));
    }

    #[test]
    fn test_lazy_list_stays_lazy() {
        let seeded = TestGraph::new(ExecutionConfig::default());
        seeded.add_vertex("a", "person", &[]);
        seeded.add_vertex("b", "person", &[]);
        for i in 0..3 {
            seeded.add_edge_with(&format!("e{}", i), "knows", "a", "b", &[], Some(2));
        }

        let graph = seeded.reopen(ExecutionConfig::default().with_spill_threshold(Some(2)));
        let src = graph.source(&["a"]);
        assert!(!graph.session.cached_vertex("a").unwrap().borrow().adjacency().is_fetched());
        let mut op = add_e(&graph, &src, "b");
        drain(&mut op).unwrap();

        let a = graph.session.cached_vertex("a").unwrap();
        assert!(!a.borrow().adjacency().is_fetched());
        assert!(a.borrow().latest_out_edge_doc_id().is_some());
        assert_eq!(graph.store.requests().adjacency_constructions, 0);
    }

    #[test]
    fn test_virtual_reverse_when_reverse_edges_disabled() {
        let graph = TestGraph::new(ExecutionConfig::default().with_reverse_edges(false));
        graph.add_vertex("a", "person", &[]);
        graph.add_vertex("b", "person", &[]);
        let src = graph.source(&["a"]);
        graph
            .session
            .ensure_adjacency_fetched(&["b".to_string()])
            .unwrap();

        let mut op = add_e(&graph, &src, "b");
        let out = drain(&mut op).unwrap();
        let edge = out[0].get(1).and_then(Field::as_edge).unwrap();

        let b = graph.session.cached_vertex("b").unwrap();
        let rev = b.borrow().reverse_adjacency().get(edge.id()).cloned().unwrap();
        assert!(rev.is_virtual());
        assert!(inline_edges(&graph.store.document("b").unwrap(), EdgeSide::Reverse).is_empty());
    }

    #[test]
    fn test_missing_sink_is_error() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("a", "person", &[]);
        let src = graph.source(&["a"]);
        let mut op = add_e(&graph, &src, "nobody");
        assert!(matches!(op.next(), Err(Error::VertexNotFound(_))));
    }
}
