//! DocGraph - 文档存储之上的图查询执行核心
//!
//! 基于拉取模型的物理算子管道，在文档存储承载的图上执行 Gremlin 风格的遍历：
//! - 过滤、跨邻接表连接、重复/迭代、分组聚合、增删改
//! - 会话级顶点缓存，与持久化文档保持一致
//! - 对溢出到独立文档的邻接表透明处理

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// 重导出常用类型
pub use config::ExecutionConfig;
pub use error::{Error, Result};
pub use graph::{EdgeField, Field, RawRecord, VertexField, VertexRef};
pub use query::{BoxedOperator, ContextSource, Operator};
pub use session::{GraphSession, SessionRef};
pub use storage::{BulkCommand, BulkOutcome, Document, EdgeSide, JsonQuery, MemoryStore};
pub use types::{Cardinality, ComparisonOp, Direction, JsonDataType, Pop};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
