//! 属性字段
//!
//! 顶点多值属性、顶点单值属性、边属性以及单值属性上的元属性

use super::field::StringField;
use crate::types::JsonDataType;
use indexmap::IndexMap;

/// 单值属性上的元属性
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePropertyField {
    pub name: String,
    pub value: StringField,
    /// 所属单值属性的 ID
    pub parent_property_id: String,
    /// 所属单值属性的名字
    pub parent_name: String,
    pub vertex_id: String,
}

/// 顶点上的一个属性值
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSinglePropertyField {
    pub property_id: String,
    pub name: String,
    pub value: StringField,
    pub meta: IndexMap<String, ValuePropertyField>,
    pub vertex_id: String,
}

impl VertexSinglePropertyField {
    pub fn new(
        property_id: impl Into<String>,
        name: impl Into<String>,
        value: StringField,
        vertex_id: impl Into<String>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            name: name.into(),
            value,
            meta: IndexMap::new(),
            vertex_id: vertex_id.into(),
        }
    }

    pub fn set_meta(&mut self, name: impl Into<String>, value: StringField) {
        let name = name.into();
        let meta = ValuePropertyField {
            name: name.clone(),
            value,
            parent_property_id: self.property_id.clone(),
            parent_name: self.name.clone(),
            vertex_id: self.vertex_id.clone(),
        };
        self.meta.insert(name, meta);
    }
}

/// 顶点多值属性：同名的所有属性值，按属性 ID 索引
#[derive(Debug, Clone, PartialEq)]
pub struct VertexPropertyField {
    pub name: String,
    pub values: IndexMap<String, VertexSinglePropertyField>,
}

impl VertexPropertyField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn push(&mut self, single: VertexSinglePropertyField) {
        self.values.insert(single.property_id.clone(), single);
    }

    pub fn first(&self) -> Option<&VertexSinglePropertyField> {
        self.values.values().next()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 边属性
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePropertyField {
    pub name: String,
    pub value: StringField,
    pub edge_id: String,
    /// 边的起点与终点，定位正向与反向邻接表
    pub src_id: String,
    pub sink_id: String,
}

/// 属性字段的四种形态
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyField {
    Vertex(VertexPropertyField),
    VertexSingle(VertexSinglePropertyField),
    Edge(EdgePropertyField),
    Meta(ValuePropertyField),
}

impl PropertyField {
    pub fn name(&self) -> &str {
        match self {
            PropertyField::Vertex(p) => &p.name,
            PropertyField::VertexSingle(p) => &p.name,
            PropertyField::Edge(p) => &p.name,
            PropertyField::Meta(p) => &p.name,
        }
    }

    /// 属性的所有标量值（多值属性会返回多个）
    pub fn values(&self) -> Vec<&StringField> {
        match self {
            PropertyField::Vertex(p) => p.values.values().map(|s| &s.value).collect(),
            PropertyField::VertexSingle(p) => vec![&p.value],
            PropertyField::Edge(p) => vec![&p.value],
            PropertyField::Meta(p) => vec![&p.value],
        }
    }

    pub fn to_value(&self) -> String {
        let values = self.values();
        if values.len() == 1 {
            values[0].value.clone()
        } else {
            format!(
                "[{}]",
                values
                    .iter()
                    .map(|v| v.value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }

    pub fn data_type(&self) -> JsonDataType {
        let values = self.values();
        match values.as_slice() {
            [single] => single.data_type,
            [] => JsonDataType::Null,
            _ => JsonDataType::Array,
        }
    }
}
