//! 通用类型定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 标量值声明的 JSON 类型
///
/// 变体顺序即"宽度"顺序：比较两个值时取较宽的类型作为比较类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JsonDataType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Object,
    Array,
}

impl JsonDataType {
    /// 取两个类型中较宽的一个
    pub fn wider(self, other: JsonDataType) -> JsonDataType {
        self.max(other)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            JsonDataType::Int | JsonDataType::Long | JsonDataType::Float | JsonDataType::Double
        )
    }
}

impl Default for JsonDataType {
    fn default() -> Self {
        JsonDataType::String
    }
}

/// 顶点属性基数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// 写入前清空已有值
    Single,
    /// 追加
    List,
    /// 追加，值相同则跳过
    Set,
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::List
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        };
        write!(f, "{}", s)
    }
}

/// 遍历方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 沿出边（正向邻接表）
    Outgoing,
    /// 沿入边（反向邻接表）
    Incoming,
    Both,
}

impl Direction {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Both
    }
}

/// 一个标签匹配多个路径步骤时的选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pop {
    First,
    Last,
    All,
}

impl Default for Pop {
    fn default() -> Self {
        Pop::Last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wider_type() {
        assert_eq!(JsonDataType::Int.wider(JsonDataType::Double), JsonDataType::Double);
        assert_eq!(JsonDataType::String.wider(JsonDataType::Long), JsonDataType::String);
        assert_eq!(JsonDataType::Null.wider(JsonDataType::Boolean), JsonDataType::Boolean);
    }

    #[test]
    fn test_direction_flags() {
        assert!(Direction::Both.includes_outgoing());
        assert!(Direction::Both.includes_incoming());
        assert!(!Direction::Outgoing.includes_incoming());
    }
}
