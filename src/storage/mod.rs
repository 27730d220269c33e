//! 存储协作者接口
//!
//! 执行核心只通过这些 trait 访问远程文档存储：
//! - 读取 (DocumentReader)
//! - 写入 (DocumentWriter)
//! - 批量命令 (BulkExecutor)
//! - 边文档辅助 (EdgeDocumentHelper)
//!
//! `MemoryStore` 是一个内存实现，用于测试和演示。

mod bulk;
pub mod document;
mod memory;
mod query;

pub use bulk::{BulkCommand, BulkOutcome, EdgeSide};
pub use memory::MemoryStore;
pub use query::{JsonQuery, QueryPredicate};

use crate::error::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

/// 存储中的 JSON 文档
pub type Document = serde_json::Map<String, Value>;

/// 存储返回的一条边及其所在文档
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    /// 边对象
    pub edge: Value,
    /// 所在边文档 ID，`None` 表示内联在顶点文档中
    pub doc_id: Option<String>,
}

/// 一个顶点两个方向上的完整邻接页
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjacencyPages {
    pub forward: Vec<StoredEdge>,
    pub reverse: Vec<StoredEdge>,
}

/// 读取接口
pub trait DocumentReader {
    /// 执行顶点查询，返回顶点文档
    fn get_vertices(&self, query: &JsonQuery) -> Result<Vec<Document>>;

    /// 按 ID 读取文档（带 `_etag`）
    fn retrieve_document_by_id(&self, id: &str) -> Result<Option<Document>>;
}

/// 写入接口
pub trait DocumentWriter {
    /// 替换（`Some`）或删除（`None`）文档；`if_match` 不为空时进行乐观并发检查。
    /// 返回新的 etag，删除时为 `None`。
    fn replace_or_delete_document(
        &self,
        id: &str,
        document: Option<&Document>,
        partition_key: &str,
        if_match: Option<&str>,
    ) -> Result<Option<String>>;

    /// 批量替换或删除：文档 ID → (文档, 分区键)
    fn replace_or_delete_documents(
        &self,
        batch: &IndexMap<String, (Option<Document>, String)>,
    ) -> Result<HashMap<String, Option<String>>>;
}

/// 批量命令执行器
pub trait BulkExecutor {
    fn execute(&self, command: BulkCommand) -> Result<BulkOutcome>;
}

/// 了解边文档存储格式的辅助接口
pub trait EdgeDocumentHelper {
    /// 在源顶点的出边（含溢出页）中查找边
    fn find_edge_by_source_and_edge_id(
        &self,
        src_id: &str,
        edge_id: &str,
    ) -> Result<Option<StoredEdge>>;

    /// 一次性构造多个顶点的完整邻接表（溢出页或虚拟反向表）
    fn construct_spilled_adjacency_lists(
        &self,
        vertex_ids: &[String],
        use_reverse_edges: bool,
    ) -> Result<HashMap<String, AdjacencyPages>>;

    /// 顶点文档的某个方向是否已溢出
    fn is_spilled_vertex(&self, document: &Document, reverse: bool) -> bool;

    /// 从顶点某一侧移除一条边
    fn remove_edge(&self, vertex_id: &str, edge_id: &str, side: EdgeSide) -> Result<BulkOutcome>;

    /// 更新边属性，可能触发溢出
    fn update_edge_property(
        &self,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
        properties: &[(String, Value)],
        spill_threshold: Option<usize>,
    ) -> Result<BulkOutcome>;
}
