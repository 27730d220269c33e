//! 下推给存储的查询形状
//!
//! 查询由上层编译器构造；执行核心只会追加 `alias.id IN (...)` 合取条件。

use super::document::{vertex_property_values, KEY_ID, KEY_LABEL};
use super::Document;
use serde_json::Value;
use std::fmt;

/// 结构化的 WHERE 条件
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPredicate {
    IdIn(Vec<String>),
    LabelEquals(String),
    PropertyEquals(String, Value),
    And(Box<QueryPredicate>, Box<QueryPredicate>),
    Or(Box<QueryPredicate>, Box<QueryPredicate>),
}

impl QueryPredicate {
    pub fn and(self, other: QueryPredicate) -> QueryPredicate {
        QueryPredicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: QueryPredicate) -> QueryPredicate {
        QueryPredicate::Or(Box::new(self), Box::new(other))
    }

    /// 在顶点文档上求值
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            QueryPredicate::IdIn(ids) => doc
                .get(KEY_ID)
                .and_then(|v| v.as_str())
                .map_or(false, |id| ids.iter().any(|x| x == id)),
            QueryPredicate::LabelEquals(label) => {
                doc.get(KEY_LABEL).and_then(|v| v.as_str()) == Some(label.as_str())
            }
            QueryPredicate::PropertyEquals(name, value) => {
                vertex_property_values(doc, name).iter().any(|v| v == value)
            }
            QueryPredicate::And(a, b) => a.matches(doc) && b.matches(doc),
            QueryPredicate::Or(a, b) => a.matches(doc) || b.matches(doc),
        }
    }

    /// 渲染为查询文本
    pub fn render(&self, alias: &str) -> String {
        match self {
            QueryPredicate::IdIn(ids) => format!(
                "{}.id IN ({})",
                alias,
                ids.iter()
                    .map(|id| quote(id))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            QueryPredicate::LabelEquals(label) => format!("{}.label = {}", alias, quote(label)),
            QueryPredicate::PropertyEquals(name, value) => {
                format!("ARRAY_CONTAINS({}.{}, {}, true)", alias, name, value)
            }
            QueryPredicate::And(a, b) => format!("({}) AND ({})", a.render(alias), b.render(alias)),
            QueryPredicate::Or(a, b) => format!("({}) OR ({})", a.render(alias), b.render(alias)),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// 顶点查询：别名 + 投影 + WHERE 条件
#[derive(Debug, Clone, PartialEq)]
pub struct JsonQuery {
    pub alias: String,
    pub select_elements: Vec<String>,
    pub predicate: Option<QueryPredicate>,
}

impl JsonQuery {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            select_elements: Vec::new(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: QueryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_select(mut self, elements: Vec<String>) -> Self {
        self.select_elements = elements;
        self
    }

    /// 复制查询并追加 `alias.id IN (...)`，已有条件时以 AND 连接
    pub fn with_id_in(&self, ids: &[String]) -> JsonQuery {
        let id_in = QueryPredicate::IdIn(ids.to_vec());
        let predicate = match &self.predicate {
            Some(existing) => existing.clone().and(id_in),
            None => id_in,
        };
        JsonQuery {
            alias: self.alias.clone(),
            select_elements: self.select_elements.clone(),
            predicate: Some(predicate),
        }
    }

    pub fn where_clause(&self) -> Option<String> {
        self.predicate.as_ref().map(|p| p.render(&self.alias))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.matches(doc))
    }
}

impl fmt::Display for JsonQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let select = if self.select_elements.is_empty() {
            self.alias.clone()
        } else {
            self.select_elements.join(", ")
        };
        write!(f, "SELECT {} FROM Node {}", select, self.alias)?;
        if let Some(w) = self.where_clause() {
            write!(f, " WHERE {}", w)?;
        }
        Ok(())
    }
}
