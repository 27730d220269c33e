//! 边与邻接表定义
//!
//! 每条逻辑边在源顶点的出邻接表中有一个正向条目，在汇顶点的入邻接表中有一个共享边 ID 的反向条目

use super::field::StringField;
use super::property::EdgePropertyField;
use indexmap::IndexMap;

/// 边
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeField {
    /// 边 ID（正反向条目共享）
    id: String,
    /// 边标签
    label: String,
    /// 源顶点
    src_id: String,
    src_label: String,
    /// 汇顶点
    sink_id: String,
    sink_label: String,
    /// 属性
    properties: IndexMap<String, EdgePropertyField>,
    /// 存放该边的文档 ID，`None` 表示内联在所属顶点文档中
    doc_id: Option<String>,
    /// 是否为汇顶点入邻接表中的反向条目
    is_reverse: bool,
    /// 反向边关闭时缓存的虚拟反向条目，从不持久化
    is_virtual: bool,
}

impl EdgeField {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        src_id: impl Into<String>,
        sink_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            src_id: src_id.into(),
            src_label: String::new(),
            sink_id: sink_id.into(),
            sink_label: String::new(),
            properties: IndexMap::new(),
            doc_id: None,
            is_reverse: false,
            is_virtual: false,
        }
    }

    pub fn with_vertex_labels(
        mut self,
        src_label: impl Into<String>,
        sink_label: impl Into<String>,
    ) -> Self {
        self.src_label = src_label.into();
        self.sink_label = sink_label.into();
        self
    }

    pub fn with_doc_id(mut self, doc_id: Option<String>) -> Self {
        self.doc_id = doc_id;
        self
    }

    /// 生成对应的反向条目
    pub fn to_reverse(&self, is_virtual: bool) -> EdgeField {
        let mut reverse = self.clone();
        reverse.is_reverse = true;
        reverse.is_virtual = is_virtual;
        reverse.doc_id = None;
        reverse
    }

    pub fn as_reverse(mut self) -> Self {
        self.is_reverse = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn src_id(&self) -> &str {
        &self.src_id
    }

    pub fn src_label(&self) -> &str {
        &self.src_label
    }

    pub fn sink_id(&self) -> &str {
        &self.sink_id
    }

    pub fn sink_label(&self) -> &str {
        &self.sink_label
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    pub fn set_doc_id(&mut self, doc_id: Option<String>) {
        self.doc_id = doc_id;
    }

    pub fn is_reverse(&self) -> bool {
        self.is_reverse
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// 所属邻接表所在顶点
    pub fn owner_id(&self) -> &str {
        if self.is_reverse {
            &self.sink_id
        } else {
            &self.src_id
        }
    }

    /// 相对于所属邻接表的另一端顶点
    pub fn other_vertex_id(&self) -> &str {
        if self.is_reverse {
            &self.src_id
        } else {
            &self.sink_id
        }
    }

    pub fn property(&self, name: &str) -> Option<&EdgePropertyField> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &EdgePropertyField> {
        self.properties.values()
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: StringField) {
        let name = name.into();
        let prop = EdgePropertyField {
            name: name.clone(),
            value,
            edge_id: self.id.clone(),
            src_id: self.src_id.clone(),
            sink_id: self.sink_id.clone(),
        };
        self.properties.insert(name, prop);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<EdgePropertyField> {
        self.properties.shift_remove(name)
    }
}

/// 邻接表：某个方向上与顶点关联的边
///
/// 未获取（lazy）的邻接表必须先经过一次批量构造才能读取。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdjacencyListField {
    edges: IndexMap<String, EdgeField>,
    fetched: bool,
}

impl AdjacencyListField {
    /// 尚未获取的邻接表
    pub fn lazy() -> Self {
        Self {
            edges: IndexMap::new(),
            fetched: false,
        }
    }

    /// 已物化的邻接表
    pub fn fetched(edges: impl IntoIterator<Item = EdgeField>) -> Self {
        let mut list = Self {
            edges: IndexMap::new(),
            fetched: true,
        };
        for e in edges {
            list.insert(e);
        }
        list
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    /// 用存储返回的边填充延迟邻接表
    pub fn materialize(&mut self, edges: impl IntoIterator<Item = EdgeField>) {
        self.edges.clear();
        for e in edges {
            self.edges.insert(e.id().to_string(), e);
        }
        self.fetched = true;
    }

    pub fn insert(&mut self, edge: EdgeField) {
        self.edges.insert(edge.id().to_string(), edge);
    }

    pub fn remove(&mut self, edge_id: &str) -> Option<EdgeField> {
        self.edges.shift_remove(edge_id)
    }

    pub fn get(&self, edge_id: &str) -> Option<&EdgeField> {
        self.edges.get(edge_id)
    }

    pub fn get_mut(&mut self, edge_id: &str) -> Option<&mut EdgeField> {
        self.edges.get_mut(edge_id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeField> {
        self.edges.values()
    }

    pub fn edge_ids(&self) -> Vec<String> {
        self.edges.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 邻接表溢出后，把所有已缓存的边重定向到新的溢出文档
    pub fn redirect_document(&mut self, doc_id: &str) {
        for edge in self.edges.values_mut() {
            edge.set_doc_id(Some(doc_id.to_string()));
        }
    }
}
