//! 图数据模型
//!
//! 定义记录、字段、顶点、边、属性以及会话级顶点缓存

mod cache;
mod edge;
mod field;
mod property;
mod record;
mod vertex;

pub use cache::VertexCache;
pub use edge::{AdjacencyListField, EdgeField};
pub use field::{
    CollectionField, Compose1Field, Field, MapField, PathField, PathStep, StringField,
};
pub use property::{
    EdgePropertyField, PropertyField, ValuePropertyField, VertexPropertyField,
    VertexSinglePropertyField,
};
pub use record::RawRecord;
pub use vertex::{VertexField, VertexRef};
