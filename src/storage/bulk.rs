//! 批量命令与结构化结果

use super::Document;
use serde_json::Value;

/// 边条目所在的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSide {
    /// 源顶点的出邻接表
    Forward,
    /// 汇顶点的入邻接表
    Reverse,
}

impl EdgeSide {
    pub fn is_reverse(self) -> bool {
        matches!(self, EdgeSide::Reverse)
    }

    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            EdgeSide::Reverse
        } else {
            EdgeSide::Forward
        }
    }
}

/// 批量命令
#[derive(Debug, Clone, PartialEq)]
pub enum BulkCommand {
    AddVertex {
        document: Document,
    },
    AddEdge {
        vertex_id: String,
        edge: Value,
        side: EdgeSide,
        spill_threshold: Option<usize>,
    },
    DropEdge {
        vertex_id: String,
        edge_id: String,
        side: EdgeSide,
    },
    DropVertexProperty {
        vertex_id: String,
        name: String,
    },
    DropVertexSingleProperty {
        vertex_id: String,
        name: String,
        property_id: String,
    },
    DropVertexSinglePropertyMetaProperty {
        vertex_id: String,
        name: String,
        property_id: String,
        meta_name: String,
    },
    UpdateEdgeProperty {
        vertex_id: String,
        edge_id: String,
        side: EdgeSide,
        properties: Vec<(String, Value)>,
        spill_threshold: Option<usize>,
    },
    DropEdgeProperty {
        vertex_id: String,
        edge_id: String,
        side: EdgeSide,
        names: Vec<String>,
    },
}

impl BulkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BulkCommand::AddVertex { .. } => "AddVertex",
            BulkCommand::AddEdge { .. } => "AddEdge",
            BulkCommand::DropEdge { .. } => "DropEdge",
            BulkCommand::DropVertexProperty { .. } => "DropVertexProperty",
            BulkCommand::DropVertexSingleProperty { .. } => "DropVertexSingleProperty",
            BulkCommand::DropVertexSinglePropertyMetaProperty { .. } => {
                "DropVertexSinglePropertyMetaProperty"
            }
            BulkCommand::UpdateEdgeProperty { .. } => "UpdateEdgeProperty",
            BulkCommand::DropEdgeProperty { .. } => "DropEdgeProperty",
        }
    }

    /// 命令修改的顶点文档
    pub fn vertex_id(&self) -> Option<&str> {
        match self {
            BulkCommand::AddVertex { document } => document.get("id").and_then(|v| v.as_str()),
            BulkCommand::AddEdge { vertex_id, .. }
            | BulkCommand::DropEdge { vertex_id, .. }
            | BulkCommand::DropVertexProperty { vertex_id, .. }
            | BulkCommand::DropVertexSingleProperty { vertex_id, .. }
            | BulkCommand::DropVertexSinglePropertyMetaProperty { vertex_id, .. }
            | BulkCommand::UpdateEdgeProperty { vertex_id, .. }
            | BulkCommand::DropEdgeProperty { vertex_id, .. } => Some(vertex_id),
        }
    }
}

/// 批量命令的结构化结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// 目标边/属性是否存在
    pub found: bool,
    /// 本次写入是否使邻接表由内联转为溢出
    pub did_spill: bool,
    /// 边当前所在的文档 ID，`None` 表示内联
    pub doc_id: Option<String>,
    /// 边在另一侧的顶点 ID
    pub other_vertex_id: Option<String>,
    /// 被修改的顶点文档的新 etag
    pub etag: Option<String>,
}

impl BulkOutcome {
    pub fn found() -> Self {
        Self {
            found: true,
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}
