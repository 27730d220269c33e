//! 字段模型
//!
//! 算子之间流动的值：标量、顶点、边、属性、集合、映射、路径等

use super::edge::{AdjacencyListField, EdgeField};
use super::property::PropertyField;
use super::vertex::VertexRef;
use crate::types::JsonDataType;
use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;

/// 标量值，携带声明的 JSON 类型
#[derive(Debug, Clone, PartialEq)]
pub struct StringField {
    pub value: String,
    pub data_type: JsonDataType,
}

impl StringField {
    pub fn new(value: impl Into<String>, data_type: JsonDataType) -> Self {
        Self {
            value: value.into(),
            data_type,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value, JsonDataType::String)
    }

    pub fn long(value: i64) -> Self {
        Self::new(value.to_string(), JsonDataType::Long)
    }

    pub fn double(value: f64) -> Self {
        Self::new(value.to_string(), JsonDataType::Double)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value.to_string(), JsonDataType::Boolean)
    }

    /// 从 JSON 值构造，保留其类型
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::new("null", JsonDataType::Null),
            Value::Bool(b) => Self::boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i32::try_from(i).is_ok() {
                        Self::new(i.to_string(), JsonDataType::Int)
                    } else {
                        Self::long(i)
                    }
                } else if let Some(u) = n.as_u64() {
                    Self::new(u.to_string(), JsonDataType::Long)
                } else {
                    Self::new(n.to_string(), JsonDataType::Double)
                }
            }
            Value::String(s) => Self::string(s.clone()),
            Value::Array(_) => Self::new(value.to_string(), JsonDataType::Array),
            Value::Object(_) => Self::new(value.to_string(), JsonDataType::Object),
        }
    }

    /// 按声明类型还原为 JSON 值，解析失败时退回字符串
    pub fn to_json(&self) -> Value {
        match self.data_type {
            JsonDataType::Null => Value::Null,
            JsonDataType::Boolean => self
                .value
                .parse::<bool>()
                .map(Value::Bool)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
            JsonDataType::Int | JsonDataType::Long => self
                .value
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
            JsonDataType::Float | JsonDataType::Double => self
                .value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(self.value.clone())),
            JsonDataType::String => Value::String(self.value.clone()),
            JsonDataType::Object | JsonDataType::Array => serde_json::from_str(&self.value)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if self.data_type.is_numeric() {
            self.value.parse::<f64>().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for StringField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// 有序集合
#[derive(Debug, Clone, Default)]
pub struct CollectionField {
    pub items: Vec<Field>,
}

impl CollectionField {
    pub fn new(items: Vec<Field>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 有序映射，键按值语义唯一
#[derive(Debug, Clone, Default)]
pub struct MapField {
    entries: IndexMap<String, (Field, Field)>,
}

impl MapField {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入键值，已有相同键时替换值并保留原位置
    pub fn insert(&mut self, key: Field, value: Field) {
        let k = key.to_value();
        match self.entries.get_mut(&k) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(k, (key, value));
            }
        }
    }

    pub fn get(&self, key: &Field) -> Option<&Field> {
        self.entries.get(&key.to_value()).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &Field) -> Option<&mut Field> {
        self.entries.get_mut(&key.to_value()).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Field)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 路径上的一步：零个或多个标签 + 值
#[derive(Debug, Clone)]
pub struct PathStep {
    pub labels: SmallVec<[String; 2]>,
    pub value: Option<Field>,
}

impl PathStep {
    pub fn new(value: Option<Field>) -> Self {
        Self {
            labels: SmallVec::new(),
            value,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// 路径
#[derive(Debug, Clone, Default)]
pub struct PathField {
    pub steps: Vec<PathStep>,
}

impl PathField {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    /// 所有带有该标签的步骤值
    pub fn labelled(&self, label: &str) -> Vec<&Field> {
        self.steps
            .iter()
            .filter(|s| s.has_label(label))
            .filter_map(|s| s.value.as_ref())
            .collect()
    }
}

/// 名称 → 字段的中间投影单元
#[derive(Debug, Clone)]
pub struct Compose1Field {
    pub fields: IndexMap<String, Field>,
    pub default_key: String,
}

impl Compose1Field {
    pub fn new(fields: IndexMap<String, Field>, default_key: impl Into<String>) -> Self {
        Self {
            fields,
            default_key: default_key.into(),
        }
    }

    pub fn default_value(&self) -> Option<&Field> {
        self.fields.get(&self.default_key)
    }
}

/// 字段：封闭的标签联合
#[derive(Debug, Clone)]
pub enum Field {
    Value(StringField),
    Vertex(VertexRef),
    Edge(EdgeField),
    Property(PropertyField),
    Collection(CollectionField),
    Map(MapField),
    Path(PathField),
    Compose1(Compose1Field),
    AdjacencyList(AdjacencyListField),
}

impl Field {
    pub fn string(value: impl Into<String>) -> Self {
        Field::Value(StringField::string(value))
    }

    pub fn long(value: i64) -> Self {
        Field::Value(StringField::long(value))
    }

    pub fn double(value: f64) -> Self {
        Field::Value(StringField::double(value))
    }

    pub fn boolean(value: bool) -> Self {
        Field::Value(StringField::boolean(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Field::Value(_) => "value",
            Field::Vertex(_) => "vertex",
            Field::Edge(_) => "edge",
            Field::Property(_) => "property",
            Field::Collection(_) => "collection",
            Field::Map(_) => "map",
            Field::Path(_) => "path",
            Field::Compose1(_) => "compose1",
            Field::AdjacencyList(_) => "adjacency_list",
        }
    }

    /// 值的字符串表示；顶点和边取其 ID
    pub fn to_value(&self) -> String {
        match self {
            Field::Value(s) => s.value.clone(),
            Field::Vertex(v) => v.borrow().id().to_string(),
            Field::Edge(e) => e.id().to_string(),
            Field::Property(p) => p.to_value(),
            Field::Collection(c) => join_values(c.items.iter()),
            Field::Map(m) => format!(
                "[{}]",
                m.iter()
                    .map(|(k, v)| format!("{}:{}", k.to_value(), v.to_value()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Field::Path(p) => join_values(p.steps.iter().filter_map(|s| s.value.as_ref())),
            Field::Compose1(c) => c
                .default_value()
                .map(|f| f.to_value())
                .unwrap_or_default(),
            Field::AdjacencyList(a) => format!(
                "[{}]",
                a.edges().map(|e| e.id().to_string()).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    /// 参与比较时使用的声明类型
    pub fn data_type(&self) -> JsonDataType {
        match self {
            Field::Value(s) => s.data_type,
            Field::Property(p) => p.data_type(),
            Field::Compose1(c) => c
                .default_value()
                .map(|f| f.data_type())
                .unwrap_or(JsonDataType::Null),
            Field::Collection(_) | Field::Path(_) | Field::AdjacencyList(_) => JsonDataType::Array,
            Field::Map(_) => JsonDataType::Object,
            Field::Vertex(_) | Field::Edge(_) => JsonDataType::String,
        }
    }

    pub fn as_string_field(&self) -> Option<&StringField> {
        match self {
            Field::Value(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexRef> {
        match self {
            Field::Vertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeField> {
        match self {
            Field::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// 当作顶点引用使用时的 ID：顶点取自身 ID，标量取其值
    pub fn vertex_id(&self) -> Option<String> {
        match self {
            Field::Vertex(v) => Some(v.borrow().id().to_string()),
            Field::Value(s) => Some(s.value.clone()),
            Field::Compose1(c) => c.default_value().and_then(|f| f.vertex_id()),
            _ => None,
        }
    }

    /// 展开为元素列表：集合/路径/映射条目；其他字段视为单元素
    pub fn elements(&self) -> Vec<Field> {
        match self {
            Field::Collection(c) => c.items.clone(),
            Field::Path(p) => p.steps.iter().filter_map(|s| s.value.clone()).collect(),
            Field::Map(m) => m
                .iter()
                .map(|(k, v)| {
                    let mut entry = MapField::new();
                    entry.insert(k.clone(), v.clone());
                    Field::Map(entry)
                })
                .collect(),
            other => vec![other.clone()],
        }
    }
}

fn join_values<'a>(items: impl Iterator<Item = &'a Field>) -> String {
    format!(
        "[{}]",
        items.map(|f| f.to_value()).collect::<Vec<_>>().join(", ")
    )
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Vertex(a), Field::Vertex(b)) => a.borrow().id() == b.borrow().id(),
            (Field::Edge(a), Field::Edge(b)) => a.id() == b.id(),
            (Field::Vertex(_), _) | (_, Field::Vertex(_)) => false,
            (Field::Edge(_), _) | (_, Field::Edge(_)) => false,
            _ => self.to_value() == other.to_value(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<StringField> for Field {
    fn from(s: StringField) -> Self {
        Field::Value(s)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::string(s)
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::long(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_json_types() {
        assert_eq!(StringField::from_json(&json!(3)).data_type, JsonDataType::Int);
        assert_eq!(
            StringField::from_json(&json!(5_000_000_000i64)).data_type,
            JsonDataType::Long
        );
        assert_eq!(StringField::from_json(&json!(1.5)).data_type, JsonDataType::Double);
        assert_eq!(StringField::from_json(&json!(true)).data_type, JsonDataType::Boolean);
        assert_eq!(StringField::from_json(&json!(null)).data_type, JsonDataType::Null);
        assert_eq!(StringField::from_json(&json!(42)).to_json(), json!(42));
        assert_eq!(StringField::new("x", JsonDataType::Long).to_json(), json!("x"));
    }

    #[test]
    fn test_map_field_unique_keys() {
        let mut map = MapField::new();
        map.insert(Field::string("a"), Field::long(1));
        map.insert(Field::string("b"), Field::long(2));
        map.insert(Field::string("a"), Field::long(3));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Field::string("a")), Some(&Field::long(3)));
        let keys: Vec<String> = map.iter().map(|(k, _)| k.to_value()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_path_labels() {
        let path = PathField::new(vec![
            PathStep::new(Some(Field::string("x"))).with_label("a"),
            PathStep::new(Some(Field::string("y"))),
            PathStep::new(Some(Field::string("z"))).with_label("a"),
        ]);
        let labelled: Vec<String> = path.labelled("a").iter().map(|f| f.to_value()).collect();
        assert_eq!(labelled, vec!["x", "z"]);
        assert_eq!(Field::Path(path).to_value(), "[x, y, z]");
    }
}
