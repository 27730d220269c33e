//! 文档格式
//!
//! 顶点文档：
//! ```text
//! { "id", "_partition", "label",
//!   "<name>": [ { "_value", "_propId", "_meta": { .. } } ],
//!   "_edge": [ <edge> ], "_edgeSpilled", "_latestEdgeDoc",
//!   "_reverse_edge": [ <edge> ], "_reverseEdgeSpilled", "_latestReverseEdgeDoc" }
//! ```
//! 边对象：`{ "id", "label", "_srcV", "_srcVLabel", "_sinkV", "_sinkVLabel", <props> }`
//!
//! 溢出页（边文档）：`{ "id", "_partition", "_vertexId", "_isReverse", "_edge": [ <edge> ] }`

use super::bulk::EdgeSide;
use super::{Document, EdgeDocumentHelper};
use crate::error::{Error, Result};
use crate::graph::{
    AdjacencyListField, EdgeField, StringField, VertexField, VertexSinglePropertyField,
};
use serde_json::{json, Value};

pub const KEY_ID: &str = "id";
pub const KEY_LABEL: &str = "label";
pub const KEY_PARTITION: &str = "_partition";
pub const KEY_ETAG: &str = "_etag";
pub const KEY_EDGE: &str = "_edge";
pub const KEY_REVERSE_EDGE: &str = "_reverse_edge";
pub const KEY_EDGE_SPILLED: &str = "_edgeSpilled";
pub const KEY_REVERSE_EDGE_SPILLED: &str = "_reverseEdgeSpilled";
pub const KEY_LATEST_EDGE_DOC: &str = "_latestEdgeDoc";
pub const KEY_LATEST_REVERSE_EDGE_DOC: &str = "_latestReverseEdgeDoc";
pub const KEY_VERTEX_ID: &str = "_vertexId";
pub const KEY_IS_REVERSE: &str = "_isReverse";
pub const KEY_SRC_V: &str = "_srcV";
pub const KEY_SRC_V_LABEL: &str = "_srcVLabel";
pub const KEY_SINK_V: &str = "_sinkV";
pub const KEY_SINK_V_LABEL: &str = "_sinkVLabel";
pub const KEY_VALUE: &str = "_value";
pub const KEY_PROP_ID: &str = "_propId";
pub const KEY_META: &str = "_meta";

const RESERVED_VERTEX_KEYS: &[&str] = &[
    KEY_ID,
    KEY_LABEL,
    KEY_PARTITION,
    KEY_ETAG,
    KEY_EDGE,
    KEY_REVERSE_EDGE,
    KEY_EDGE_SPILLED,
    KEY_REVERSE_EDGE_SPILLED,
    KEY_LATEST_EDGE_DOC,
    KEY_LATEST_REVERSE_EDGE_DOC,
];

const RESERVED_EDGE_KEYS: &[&str] = &[
    KEY_ID,
    KEY_LABEL,
    KEY_SRC_V,
    KEY_SRC_V_LABEL,
    KEY_SINK_V,
    KEY_SINK_V_LABEL,
];

/// 某一侧的 (邻接表键, 溢出标记键, 最新边文档键)
pub fn side_keys(side: EdgeSide) -> (&'static str, &'static str, &'static str) {
    match side {
        EdgeSide::Forward => (KEY_EDGE, KEY_EDGE_SPILLED, KEY_LATEST_EDGE_DOC),
        EdgeSide::Reverse => (
            KEY_REVERSE_EDGE,
            KEY_REVERSE_EDGE_SPILLED,
            KEY_LATEST_REVERSE_EDGE_DOC,
        ),
    }
}

pub fn is_reserved_vertex_key(key: &str) -> bool {
    RESERVED_VERTEX_KEYS.contains(&key) || key.starts_with('_')
}

pub fn is_reserved_edge_key(key: &str) -> bool {
    RESERVED_EDGE_KEYS.contains(&key)
}

/// 是否为溢出页而不是顶点文档
pub fn is_edge_document(doc: &Document) -> bool {
    doc.contains_key(KEY_VERTEX_ID)
}

pub fn document_id(doc: &Document) -> Result<&str> {
    doc.get(KEY_ID)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedDocument("文档缺少 id".to_string()))
}

pub fn etag_of(doc: &Document) -> Option<String> {
    doc.get(KEY_ETAG).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// 新顶点文档模板
pub fn new_vertex_document(id: &str, label: &str) -> Document {
    let mut doc = Document::new();
    doc.insert(KEY_ID.to_string(), json!(id));
    doc.insert(KEY_PARTITION.to_string(), json!(id));
    doc.insert(KEY_LABEL.to_string(), json!(label));
    doc.insert(KEY_EDGE.to_string(), json!([]));
    doc.insert(KEY_REVERSE_EDGE.to_string(), json!([]));
    doc
}

/// 某个属性的所有原始值
pub fn vertex_property_values(doc: &Document, name: &str) -> Vec<Value> {
    match doc.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get(KEY_VALUE).cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// 单个属性值的 JSON 表示
pub fn single_property_json(property_id: &str, value: Value, meta: &[(String, Value)]) -> Value {
    let mut meta_obj = serde_json::Map::new();
    for (k, v) in meta {
        meta_obj.insert(k.clone(), v.clone());
    }
    json!({
        KEY_VALUE: value,
        KEY_PROP_ID: property_id,
        KEY_META: Value::Object(meta_obj),
    })
}

pub fn edge_to_json(edge: &EdgeField) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert(KEY_ID.to_string(), json!(edge.id()));
    obj.insert(KEY_LABEL.to_string(), json!(edge.label()));
    obj.insert(KEY_SRC_V.to_string(), json!(edge.src_id()));
    obj.insert(KEY_SRC_V_LABEL.to_string(), json!(edge.src_label()));
    obj.insert(KEY_SINK_V.to_string(), json!(edge.sink_id()));
    obj.insert(KEY_SINK_V_LABEL.to_string(), json!(edge.sink_label()));
    for p in edge.properties() {
        obj.insert(p.name.clone(), p.value.to_json());
    }
    Value::Object(obj)
}

fn required_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedDocument(format!("边对象缺少 {}", key)))
}

pub fn edge_from_json(value: &Value, reverse: bool, doc_id: Option<String>) -> Result<EdgeField> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedDocument("边必须是 JSON 对象".to_string()))?;

    let mut edge = EdgeField::new(
        required_str(obj, KEY_ID)?,
        obj.get(KEY_LABEL).and_then(|v| v.as_str()).unwrap_or_default(),
        required_str(obj, KEY_SRC_V)?,
        required_str(obj, KEY_SINK_V)?,
    )
    .with_vertex_labels(
        obj.get(KEY_SRC_V_LABEL)
            .and_then(|v| v.as_str())
            .unwrap_or_default(),
        obj.get(KEY_SINK_V_LABEL)
            .and_then(|v| v.as_str())
            .unwrap_or_default(),
    )
    .with_doc_id(doc_id);

    for (k, v) in obj {
        if !is_reserved_edge_key(k) {
            edge.set_property(k.clone(), StringField::from_json(v));
        }
    }

    Ok(if reverse { edge.as_reverse() } else { edge })
}

/// 顶点文档中的内联边
pub fn inline_edges(doc: &Document, side: EdgeSide) -> Vec<Value> {
    let (list_key, _, _) = side_keys(side);
    match doc.get(list_key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

pub fn vertex_properties_from_document(
    doc: &Document,
    vertex_id: &str,
) -> Result<Vec<VertexSinglePropertyField>> {
    let mut result = Vec::new();
    for (name, value) in doc {
        if is_reserved_vertex_key(name) {
            continue;
        }
        let items = value.as_array().ok_or_else(|| {
            Error::MalformedDocument(format!("顶点属性 {} 必须是数组", name))
        })?;
        for item in items {
            let prop_id = item
                .get(KEY_PROP_ID)
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::MalformedDocument(format!("属性 {} 缺少 _propId", name)))?;
            let raw = item.get(KEY_VALUE).cloned().unwrap_or(Value::Null);
            let mut single = VertexSinglePropertyField::new(
                prop_id,
                name.clone(),
                StringField::from_json(&raw),
                vertex_id,
            );
            if let Some(Value::Object(meta)) = item.get(KEY_META) {
                for (k, v) in meta {
                    single.set_meta(k.clone(), StringField::from_json(v));
                }
            }
            result.push(single);
        }
    }
    Ok(result)
}

fn adjacency_from_document(
    doc: &Document,
    helper: &dyn EdgeDocumentHelper,
    side: EdgeSide,
) -> Result<(AdjacencyListField, Option<String>)> {
    let (_, _, latest_key) = side_keys(side);
    if helper.is_spilled_vertex(doc, side.is_reverse()) {
        let latest = doc
            .get(latest_key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        return Ok((AdjacencyListField::lazy(), latest));
    }

    let edges = inline_edges(doc, side)
        .iter()
        .map(|e| edge_from_json(e, side.is_reverse(), None))
        .collect::<Result<Vec<_>>>()?;
    Ok((AdjacencyListField::fetched(edges), None))
}

/// 从顶点文档构造顶点字段
///
/// 溢出的邻接表以及反向边关闭时的虚拟入邻接表都以延迟状态返回。
pub fn vertex_from_document(
    doc: &Document,
    helper: &dyn EdgeDocumentHelper,
    use_reverse_edges: bool,
) -> Result<VertexField> {
    let id = document_id(doc)?;
    let label = doc
        .get(KEY_LABEL)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let partition = doc
        .get(KEY_PARTITION)
        .and_then(|v| v.as_str())
        .unwrap_or(id);

    let mut vertex = VertexField::new(id, label).with_partition_key(partition);
    for single in vertex_properties_from_document(doc, id)? {
        vertex.add_property_value(single);
    }

    let (forward, latest_out) = adjacency_from_document(doc, helper, EdgeSide::Forward)?;
    vertex.set_adjacency(forward);
    vertex.set_latest_edge_doc_id(false, latest_out);

    if use_reverse_edges {
        let (reverse, latest_in) = adjacency_from_document(doc, helper, EdgeSide::Reverse)?;
        vertex.set_reverse_adjacency(reverse);
        vertex.set_latest_edge_doc_id(true, latest_in);
    } else {
        vertex.set_reverse_adjacency(AdjacencyListField::lazy());
    }

    Ok(vertex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_edge_json_roundtrip_keeps_properties() {
        let mut edge =
            EdgeField::new("e1", "knows", "a", "b").with_vertex_labels("person", "person");
        edge.set_property("weight", StringField::double(0.5));

        let value = edge_to_json(&edge);
        let restored = edge_from_json(&value, true, Some("d1".to_string())).unwrap();
        assert_eq!(restored.id(), "e1");
        assert!(restored.is_reverse());
        assert_eq!(restored.doc_id(), Some("d1"));
        assert_eq!(restored.property("weight").unwrap().value.value, "0.5");
        assert_eq!(restored.src_label(), "person");
    }

    #[test]
    fn test_vertex_from_inline_document() {
        let store = MemoryStore::new();
        let doc = json!({
            "id": "a",
            "_partition": "a",
            "label": "person",
            "name": [{"_value": "marko", "_propId": "p1", "_meta": {"since": 2010}}],
            "_edge": [{"id": "e1", "label": "knows", "_srcV": "a", "_sinkV": "b"}],
            "_reverse_edge": []
        });
        let vertex = vertex_from_document(doc.as_object().unwrap(), &store, true).unwrap();

        assert_eq!(vertex.label(), "person");
        assert_eq!(vertex.first_value("name").unwrap().value, "marko");
        let single = vertex.property("name").unwrap().first().unwrap();
        assert_eq!(single.meta["since"].value.value, "2010");
        assert!(vertex.adjacency().is_fetched());
        assert_eq!(vertex.adjacency().len(), 1);
        assert!(vertex.reverse_adjacency().is_fetched());
    }

    #[test]
    fn test_spilled_and_virtual_lists_are_lazy() {
        let store = MemoryStore::new();
        let doc = json!({
            "id": "a",
            "label": "person",
            "_edge": [],
            "_edgeSpilled": true,
            "_latestEdgeDoc": "page-1",
            "_reverse_edge": []
        });
        let vertex = vertex_from_document(doc.as_object().unwrap(), &store, false).unwrap();

        assert!(!vertex.adjacency().is_fetched());
        assert_eq!(vertex.latest_out_edge_doc_id(), Some("page-1"));
        assert!(!vertex.reverse_adjacency().is_fetched());
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_vertex_key("_edge"));
        assert!(is_reserved_vertex_key("id"));
        assert!(is_reserved_vertex_key("_ts"));
        assert!(!is_reserved_vertex_key("name"));
        assert!(is_reserved_edge_key("_sinkV"));
        assert!(!is_reserved_edge_key("weight"));
    }
}
