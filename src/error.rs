//! 错误类型定义

use crate::types::{ComparisonOp, JsonDataType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// 必需的遍历/属性/标签在当前记录上没有值
    #[error("无法解析的值: {0}")]
    UnresolvedValue(String),

    /// 运算符与比较类型不兼容（编译期错误，区别于宽松比较返回 false）
    #[error("不支持的比较: {op:?} 不能用于 {data_type:?} 类型")]
    UnsupportedComparison {
        op: ComparisonOp,
        data_type: JsonDataType,
    },

    /// 缓存与存储之间的不变量被破坏
    #[error("不变量被破坏: {0}")]
    InvariantViolation(String),

    /// drop/update 的目标既不是顶点、边也不是属性
    #[error("无效的操作目标: {0}")]
    InvalidTarget(String),

    #[error("顶点不存在: {0}")]
    VertexNotFound(String),

    #[error("文档不存在: {0}")]
    DocumentNotFound(String),

    #[error("版本冲突: 文档 {id} 的 etag 不匹配")]
    ConcurrencyConflict { id: String },

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("文档格式错误: {0}")]
    MalformedDocument(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl Error {
    /// 是否为致命的不变量错误（由测试捕获，不应重试）
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}
