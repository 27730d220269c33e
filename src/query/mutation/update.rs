//! Property updates
//!
//! Vertex properties go through a read-modify-write of the live document.
//! Edge properties are updated in place by the store, mirrored to the
//! reverse entry, and may spill the owning adjacency list. Updates aimed at
//! a single vertex property set its meta properties.

use super::drop_edge_properties;
use crate::error::{Error, Result};
use crate::graph::{
    EdgeField, Field, PropertyField, RawRecord, StringField, VertexRef, VertexSinglePropertyField,
};
use crate::query::operator::{BoxedOperator, Operator};
use crate::session::SessionRef;
use crate::storage::document::{
    is_reserved_edge_key, is_reserved_vertex_key, single_property_json,
    vertex_properties_from_document, KEY_ETAG, KEY_META, KEY_PROP_ID, KEY_VALUE,
};
use crate::storage::{BulkCommand, BulkOutcome, Document, EdgeSide};
use crate::types::Cardinality;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

const DROP_ALL_KEY: &str = "*";
const DROP_ALL_VALUE: &str = "null";

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub name: String,
    pub value: Value,
    pub cardinality: Cardinality,
    /// Meta properties written alongside a new vertex property value
    pub meta: Vec<(String, Value)>,
}

impl PropertyUpdate {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            cardinality: Cardinality::default(),
            meta: Vec::new(),
        }
    }

    pub fn single(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, value).with_cardinality(Cardinality::Single)
    }

    /// Removes every non-reserved property of the target
    pub fn drop_all() -> Self {
        Self::new(DROP_ALL_KEY, json!(DROP_ALL_VALUE))
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_meta(mut self, name: impl Into<String>, value: Value) -> Self {
        self.meta.push((name.into(), value));
        self
    }

    pub fn is_drop_all(&self) -> bool {
        self.name == DROP_ALL_KEY && (self.value.is_null() || self.value == json!(DROP_ALL_VALUE))
    }
}

/// Applies the updates to the element in `column` and passes the record on
pub struct UpdatePropertiesOperator {
    session: SessionRef,
    input: BoxedOperator,
    column: usize,
    updates: Vec<PropertyUpdate>,
    drop_all: bool,
    open: bool,
}

impl UpdatePropertiesOperator {
    pub fn new(
        session: SessionRef,
        input: BoxedOperator,
        column: usize,
        updates: Vec<PropertyUpdate>,
    ) -> Self {
        let drop_all = updates.iter().any(PropertyUpdate::is_drop_all);
        Self {
            session,
            input,
            column,
            updates,
            drop_all,
            open: true,
        }
    }

    fn update_field(&self, field: &Field) -> Result<()> {
        match field {
            Field::Vertex(v) if self.drop_all => self.clear_vertex(v),
            Field::Vertex(v) => self.update_vertex(v),
            Field::Edge(e) => self.update_edge(e),
            Field::Property(PropertyField::VertexSingle(p)) => self.update_meta(p),
            other => Err(Error::InvalidTarget(format!("不能更新 {} 的属性", other.kind()))),
        }
    }

    fn live_document(&self, id: &str) -> Result<Document> {
        let mut doc = self
            .session
            .retrieve_document(id)?
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        doc.remove(KEY_ETAG);
        Ok(doc)
    }

    fn update_vertex(&self, vertex: &VertexRef) -> Result<()> {
        let (id, partition_key) = {
            let v = vertex.borrow();
            (v.id().to_string(), v.partition_key().to_string())
        };
        let mut doc = self.live_document(&id)?;
        for update in &self.updates {
            apply_vertex_update(&mut doc, update)?;
        }
        self.session.write_document(&id, Some(&doc), &partition_key)?;

        let properties = vertex_properties_from_document(&doc, &id)?;
        let mut v = vertex.borrow_mut();
        v.clear_properties();
        for p in properties {
            v.add_property_value(p);
        }
        debug!("update: vertex {} ({} updates)", id, self.updates.len());
        Ok(())
    }

    fn clear_vertex(&self, vertex: &VertexRef) -> Result<()> {
        let (id, names) = {
            let v = vertex.borrow();
            (v.id().to_string(), v.property_names())
        };
        for name in &names {
            self.session.bulk(BulkCommand::DropVertexProperty {
                vertex_id: id.clone(),
                name: name.clone(),
            })?;
        }
        vertex.borrow_mut().clear_properties();
        debug!("update: dropped {} properties of {}", names.len(), id);
        Ok(())
    }

    fn update_edge(&self, edge: &EdgeField) -> Result<()> {
        let (src, sink, edge_id) = (edge.src_id(), edge.sink_id(), edge.id());
        if self.drop_all {
            let stored = self
                .session
                .find_edge(src, edge_id)?
                .ok_or_else(|| Error::InvariantViolation(format!("边 {} 在存储中不存在", edge_id)))?;
            let names = stored
                .edge
                .as_object()
                .map(|obj| obj.keys().filter(|k| !is_reserved_edge_key(k)).cloned().collect())
                .unwrap_or_default();
            return drop_edge_properties(&self.session, src, sink, edge_id, names);
        }

        let mut properties = Vec::with_capacity(self.updates.len());
        for u in &self.updates {
            if is_reserved_edge_key(&u.name) {
                return Err(Error::InvalidTarget(format!("保留键不能作为边属性: {}", u.name)));
            }
            properties.push((u.name.clone(), u.value.clone()));
        }

        let forward = self
            .session
            .update_edge_property(src, edge_id, EdgeSide::Forward, &properties)?;
        self.record_update(src, false, edge_id, &forward, &properties)?;

        if self.session.use_reverse_edges() {
            let reverse = self
                .session
                .update_edge_property(sink, edge_id, EdgeSide::Reverse, &properties)?;
            self.record_update(sink, true, edge_id, &reverse, &properties)?;
        } else if let Some(v) = self.session.cached_vertex(sink) {
            if let Some(e) = v.borrow_mut().reverse_adjacency_mut().get_mut(edge_id) {
                set_edge_properties(e, &properties);
            }
        }
        Ok(())
    }

    fn record_update(
        &self,
        vertex_id: &str,
        reverse: bool,
        edge_id: &str,
        outcome: &BulkOutcome,
        properties: &[(String, Value)],
    ) -> Result<()> {
        if !outcome.found {
            return Err(Error::InvariantViolation(format!(
                "边 {} 不在顶点 {} 的邻接表中",
                edge_id, vertex_id
            )));
        }
        if let Some(v) = self.session.cached_vertex(vertex_id) {
            self.session
                .record_edge_updated(&v, reverse, edge_id, outcome, |e| {
                    set_edge_properties(e, properties)
                });
        }
        Ok(())
    }

    fn update_meta(&self, p: &VertexSinglePropertyField) -> Result<()> {
        let mut doc = self.live_document(&p.vertex_id)?;
        let item = doc
            .get_mut(&p.name)
            .and_then(Value::as_array_mut)
            .and_then(|items| {
                items
                    .iter_mut()
                    .find(|i| {
                        i.get(KEY_PROP_ID).and_then(Value::as_str) == Some(p.property_id.as_str())
                    })
            })
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                Error::InvariantViolation(format!("属性 {}#{} 在存储中不存在", p.name, p.property_id))
            })?;
        let meta = item
            .entry(KEY_META)
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| Error::MalformedDocument(format!("属性 {} 的 _meta 不是对象", p.name)))?;
        if self.drop_all {
            meta.clear();
        } else {
            for u in &self.updates {
                meta.insert(u.name.clone(), u.value.clone());
            }
        }

        let cached = self.session.cached_vertex(&p.vertex_id);
        let partition_key = cached
            .as_ref()
            .map(|v| v.borrow().partition_key().to_string())
            .unwrap_or_else(|| p.vertex_id.clone());
        self.session
            .write_document(&p.vertex_id, Some(&doc), &partition_key)?;

        if let Some(v) = cached {
            if let Some(single) = v.borrow_mut().single_property_mut(&p.name, &p.property_id) {
                if self.drop_all {
                    single.meta.clear();
                }
                for u in self.updates.iter().filter(|u| !u.is_drop_all()) {
                    single.set_meta(u.name.as_str(), StringField::from_json(&u.value));
                }
            }
        }
        Ok(())
    }
}

fn apply_vertex_update(doc: &mut Document, update: &PropertyUpdate) -> Result<()> {
    if is_reserved_vertex_key(&update.name) {
        return Err(Error::InvalidTarget(format!("保留键不能作为顶点属性: {}", update.name)));
    }
    let entry = single_property_json(
        &Uuid::new_v4().to_string(),
        update.value.clone(),
        &update.meta,
    );
    let items = doc
        .entry(update.name.as_str())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| Error::MalformedDocument(format!("顶点属性 {} 必须是数组", update.name)))?;
    match update.cardinality {
        Cardinality::Single => {
            items.clear();
            items.push(entry);
        }
        Cardinality::List => items.push(entry),
        Cardinality::Set => {
            if !items.iter().any(|i| i.get(KEY_VALUE) == Some(&update.value)) {
                items.push(entry);
            }
        }
    }
    Ok(())
}

fn set_edge_properties(edge: &mut EdgeField, properties: &[(String, Value)]) {
    for (name, value) in properties {
        edge.set_property(name.as_str(), StringField::from_json(value));
    }
}

impl Operator for UpdatePropertiesOperator {
    fn open(&mut self) {
        self.open = true;
    }

    fn next(&mut self) -> Result<Option<RawRecord>> {
        if !self.open {
            return Ok(None);
        }
        let Some(r) = self.input.next()? else {
            self.close();
            return Ok(None);
        };
        if let Some(field) = r.get(self.column) {
            self.update_field(field)?;
        }
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
    use crate::query::{drain, ContextSource};
    use crate::storage::document::{inline_edges, vertex_property_values};
    use crate::testing::TestGraph;

    fn run(
        graph: &TestGraph,
        field: Field,
        updates: Vec<PropertyUpdate>,
    ) -> Result<Vec<RawRecord>> {
        let src = ContextSource::new();
        src.set_context(RawRecord::single(field));
        let mut op = UpdatePropertiesOperator::new(graph.session.clone(), src.boxed(), 0, updates);
        drain(&mut op)
    }

    fn cached_values(graph: &TestGraph, id: &str, name: &str) -> Vec<String> {
        let v = graph.session.cached_vertex(id).unwrap();
        let v = v.borrow();
        v.property(name)
            .map(|p| p.values.values().map(|s| s.value.value.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_cardinality_rules() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("v", "person", &[("tag", json!("a"))]);
        let v = graph.vertex_record("v").get(0).cloned().unwrap();

        run(&graph, v.clone(), vec![PropertyUpdate::new("tag", json!("b"))]).unwrap();
        assert_eq!(cached_values(&graph, "v", "tag"), vec!["a", "b"]);

        let set = PropertyUpdate::new("tag", json!("a")).with_cardinality(Cardinality::Set);
        run(&graph, v.clone(), vec![set]).unwrap();
        assert_eq!(cached_values(&graph, "v", "tag"), vec!["a", "b"]);

        run(&graph, v.clone(), vec![PropertyUpdate::single("tag", json!("c"))]).unwrap();
        assert_eq!(cached_values(&graph, "v", "tag"), vec!["c"]);
        assert_eq!(
            vertex_property_values(&graph.store.document("v").unwrap(), "tag"),
            vec![json!("c")]
        );
    }

    #[test]
    fn test_update_emits_record_and_keeps_etag_current() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("v", "person", &[]);
        let v = graph.vertex_record("v").get(0).cloned().unwrap();
        let out = run(
            &graph,
            v.clone(),
            vec![PropertyUpdate::new("age", json!(30)).with_meta("source", json!("form"))],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        // a second write must pass the etag check
        run(&graph, v, vec![PropertyUpdate::new("age", json!(31))]).unwrap();

        let vertex = graph.session.cached_vertex("v").unwrap();
        let first = vertex.borrow().property("age").unwrap().first().cloned().unwrap();
        assert_eq!(first.meta["source"].value.value, "form");
        assert_eq!(cached_values(&graph, "v", "age"), vec!["30", "31"]);
    }

    #[test]
    fn test_drop_all_sentinel() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("v", "person", &[("name", json!("ann")), ("age", json!(30))]);
        let v = graph.vertex_record("v").get(0).cloned().unwrap();
        run(&graph, v, vec![PropertyUpdate::drop_all()]).unwrap();

        let doc = graph.store.document("v").unwrap();
        assert!(doc.get("name").is_none());
        assert!(doc.get("age").is_none());
        assert_eq!(doc["label"], json!("person"));
        let vertex = graph.session.cached_vertex("v").unwrap();
        assert_eq!(vertex.borrow().properties().count(), 0);
    }

    #[test]
    fn test_edge_update_is_mirrored() {
        let graph = TestGraph::chain(&["a", "b"]);
        let a = graph.vertex_record("a");
        graph.vertex_record("b");
        let vertex = a.get(0).and_then(Field::as_vertex).unwrap().clone();
        let edge = vertex.borrow().adjacency().get("e0").cloned().unwrap();

        run(
            &graph,
            Field::Edge(edge.clone()),
            vec![PropertyUpdate::new("weight", json!(0.5))],
        )
        .unwrap();

        let b = graph.session.cached_vertex("b").unwrap();
        for cached in [
            vertex.borrow().adjacency().get("e0").cloned().unwrap(),
            b.borrow().reverse_adjacency().get("e0").cloned().unwrap(),
        ] {
            assert_eq!(cached.property("weight").unwrap().value.to_json(), json!(0.5));
        }
        assert_eq!(
            inline_edges(&graph.store.document("a").unwrap(), EdgeSide::Forward)[0]["weight"],
            json!(0.5)
        );
        assert_eq!(
            inline_edges(&graph.store.document("b").unwrap(), EdgeSide::Reverse)[0]["weight"],
            json!(0.5)
        );

        run(&graph, Field::Edge(edge), vec![PropertyUpdate::drop_all()]).unwrap();
        assert!(vertex.borrow().adjacency().get("e0").unwrap().property("weight").is_none());
        let reverse = inline_edges(&graph.store.document("b").unwrap(), EdgeSide::Reverse);
        assert!(reverse[0].get("weight").is_none());
    }

    #[test]
    fn test_edge_update_spill_redirects() {
        let seeded = TestGraph::new(ExecutionConfig::default());
        for id in ["a", "b"] {
            seeded.add_vertex(id, "node", &[]);
        }
        for i in 0..3 {
            seeded.add_edge_with(&format!("e{}", i), "to", "a", "b", &[], None);
        }

        let graph = seeded.reopen(ExecutionConfig::default().with_spill_threshold(Some(2)));
        let a = graph.vertex_record("a");
        let vertex = a.get(0).and_then(Field::as_vertex).unwrap().clone();
        let edge = vertex.borrow().adjacency().get("e1").cloned().unwrap();

        run(&graph, Field::Edge(edge), vec![PropertyUpdate::new("w", json!(1))]).unwrap();

        let pages = graph.store.edge_pages("a", EdgeSide::Forward);
        assert_eq!(pages.len(), 1);
        let v = vertex.borrow();
        assert!(v.adjacency().edges().all(|e| e.doc_id() == Some(pages[0].as_str())));
        assert_eq!(v.latest_out_edge_doc_id(), Some(pages[0].as_str()));
        assert_eq!(v.adjacency().get("e1").unwrap().property("w").unwrap().value.value, "1");
    }

    #[test]
    fn test_virtual_reverse_entry_updated_in_cache_only() {
        let seeded = TestGraph::chain(&["a", "b"]);
        let graph = seeded.reopen(ExecutionConfig::default().with_reverse_edges(false));
        let a = graph.vertex_record("a");
        graph.vertex_record("b");
        graph.session.ensure_adjacency_fetched(&["b".to_string()]).unwrap();
        let edge = a
            .get(0)
            .and_then(Field::as_vertex)
            .unwrap()
            .borrow()
            .adjacency()
            .get("e0")
            .cloned()
            .unwrap();

        run(&graph, Field::Edge(edge), vec![PropertyUpdate::new("w", json!(2))]).unwrap();

        let b = graph.session.cached_vertex("b").unwrap();
        let rev = b.borrow().reverse_adjacency().get("e0").cloned().unwrap();
        assert!(rev.is_virtual());
        assert_eq!(rev.property("w").unwrap().value.value, "2");
    }

    #[test]
    fn test_meta_update() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("v", "person", &[("name", json!("ann"))]);
        let v = graph.vertex_record("v");
        let vertex = v.get(0).and_then(Field::as_vertex).unwrap().clone();
        let single = vertex.borrow().property("name").unwrap().first().cloned().unwrap();

        run(
            &graph,
            Field::Property(PropertyField::VertexSingle(single)),
            vec![PropertyUpdate::new("source", json!("import"))],
        )
        .unwrap();

        let stored = graph.store.document("v").unwrap();
        assert_eq!(stored["name"][0][KEY_META]["source"], json!("import"));
        let cached = vertex.borrow().property("name").unwrap().first().cloned().unwrap();
        assert_eq!(cached.meta["source"].value.value, "import");
        assert_eq!(cached.meta["source"].parent_name, "name");
    }

    #[test]
    fn test_invalid_targets() {
        let graph = TestGraph::new(ExecutionConfig::default());
        graph.add_vertex("v", "person", &[]);
        let err = run(
            &graph,
            Field::long(1),
            vec![PropertyUpdate::new("x", json!(1))],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));

        let v = graph.vertex_record("v").get(0).cloned().unwrap();
        let err = run(&graph, v, vec![PropertyUpdate::new("_edge", json!(1))]).unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
    }
}
