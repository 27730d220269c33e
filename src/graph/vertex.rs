//! 顶点定义
//!
//! 会话中每个顶点 ID 只对应一个共享的 `VertexField` 对象

use super::edge::AdjacencyListField;
use super::field::StringField;
use super::property::{VertexPropertyField, VertexSinglePropertyField};
use crate::types::Direction;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// 会话缓存中共享的顶点引用
pub type VertexRef = Rc<RefCell<VertexField>>;

/// 顶点
#[derive(Debug, Clone, PartialEq)]
pub struct VertexField {
    /// 顶点 ID（同时作为分区键）
    id: String,
    partition_key: String,
    label: String,
    /// 属性名 → 多值属性
    properties: IndexMap<String, VertexPropertyField>,
    /// 出邻接表
    adjacency: AdjacencyListField,
    /// 入邻接表
    reverse_adjacency: AdjacencyListField,
    /// 出边溢出后最新的边文档
    latest_out_edge_doc_id: Option<String>,
    /// 入边溢出后最新的边文档
    latest_in_edge_doc_id: Option<String>,
}

impl VertexField {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            partition_key: id.clone(),
            id,
            label: label.into(),
            properties: IndexMap::new(),
            adjacency: AdjacencyListField::fetched(Vec::new()),
            reverse_adjacency: AdjacencyListField::fetched(Vec::new()),
            latest_out_edge_doc_id: None,
            latest_in_edge_doc_id: None,
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn into_ref(self) -> VertexRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn property(&self, name: &str) -> Option<&VertexPropertyField> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &VertexPropertyField> {
        self.properties.values()
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// 追加一个属性值
    pub fn add_property_value(&mut self, single: VertexSinglePropertyField) {
        self.properties
            .entry(single.name.clone())
            .or_insert_with(|| VertexPropertyField::new(single.name.clone()))
            .push(single);
    }

    /// 用给定值整体替换同名属性
    pub fn replace_property(&mut self, property: VertexPropertyField) {
        if property.is_empty() {
            self.properties.shift_remove(&property.name);
        } else {
            self.properties.insert(property.name.clone(), property);
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<VertexPropertyField> {
        self.properties.shift_remove(name)
    }

    /// 按属性 ID 移除单个属性值，属性为空时一并移除
    pub fn remove_single_property(
        &mut self,
        name: &str,
        property_id: &str,
    ) -> Option<VertexSinglePropertyField> {
        let prop = self.properties.get_mut(name)?;
        let removed = prop.values.shift_remove(property_id);
        if prop.is_empty() {
            self.properties.shift_remove(name);
        }
        removed
    }

    pub fn single_property_mut(
        &mut self,
        name: &str,
        property_id: &str,
    ) -> Option<&mut VertexSinglePropertyField> {
        self.properties.get_mut(name)?.values.get_mut(property_id)
    }

    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    /// 第一个属性值（便于测试和投影）
    pub fn first_value(&self, name: &str) -> Option<&StringField> {
        self.properties
            .get(name)
            .and_then(|p| p.first())
            .map(|s| &s.value)
    }

    pub fn adjacency(&self) -> &AdjacencyListField {
        &self.adjacency
    }

    pub fn adjacency_mut(&mut self) -> &mut AdjacencyListField {
        &mut self.adjacency
    }

    pub fn reverse_adjacency(&self) -> &AdjacencyListField {
        &self.reverse_adjacency
    }

    pub fn reverse_adjacency_mut(&mut self) -> &mut AdjacencyListField {
        &mut self.reverse_adjacency
    }

    pub fn set_adjacency(&mut self, list: AdjacencyListField) {
        self.adjacency = list;
    }

    pub fn set_reverse_adjacency(&mut self, list: AdjacencyListField) {
        self.reverse_adjacency = list;
    }

    /// 按方向取邻接表；`Both` 不是单个列表，返回出邻接表
    pub fn adjacency_for(&self, direction: Direction) -> &AdjacencyListField {
        match direction {
            Direction::Incoming => &self.reverse_adjacency,
            Direction::Outgoing | Direction::Both => &self.adjacency,
        }
    }

    pub fn adjacency_for_mut(&mut self, reverse: bool) -> &mut AdjacencyListField {
        if reverse {
            &mut self.reverse_adjacency
        } else {
            &mut self.adjacency
        }
    }

    pub fn latest_out_edge_doc_id(&self) -> Option<&str> {
        self.latest_out_edge_doc_id.as_deref()
    }

    pub fn latest_in_edge_doc_id(&self) -> Option<&str> {
        self.latest_in_edge_doc_id.as_deref()
    }

    pub fn set_latest_edge_doc_id(&mut self, reverse: bool, doc_id: Option<String>) {
        if reverse {
            self.latest_in_edge_doc_id = doc_id;
        } else {
            self.latest_out_edge_doc_id = doc_id;
        }
    }

    /// 两个方向的邻接表是否都已物化
    pub fn is_fully_fetched(&self) -> bool {
        self.adjacency.is_fetched() && self.reverse_adjacency.is_fetched()
    }

    /// 两个方向都没有任何边条目
    pub fn has_no_edges(&self) -> bool {
        self.adjacency.is_empty() && self.reverse_adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeField;

    #[test]
    fn test_vertex_properties() {
        let mut v = VertexField::new("v1", "person");
        v.add_property_value(VertexSinglePropertyField::new(
            "p1",
            "name",
            StringField::string("marko"),
            "v1",
        ));
        v.add_property_value(VertexSinglePropertyField::new(
            "p2",
            "name",
            StringField::string("mark"),
            "v1",
        ));

        assert_eq!(v.partition_key(), "v1");
        assert_eq!(v.property("name").unwrap().values.len(), 2);
        assert_eq!(v.first_value("name").unwrap().value, "marko");

        v.remove_single_property("name", "p1");
        v.remove_single_property("name", "p2");
        assert!(v.property("name").is_none());
    }

    #[test]
    fn test_vertex_edges() {
        let mut v = VertexField::new("a", "person");
        assert!(v.has_no_edges());
        v.adjacency_mut().insert(EdgeField::new("e1", "knows", "a", "b"));
        assert!(!v.has_no_edges());
        assert_eq!(v.adjacency_for(Direction::Outgoing).len(), 1);
        assert!(v.adjacency_for(Direction::Incoming).is_empty());
    }
}
