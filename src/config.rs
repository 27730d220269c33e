//! 执行配置
//!
//! 会话级别的批量/溢出参数，可从 JSON 加载

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 一跳遍历默认批次大小
pub const DEFAULT_TRAVERSAL_BATCH_SIZE: usize = 5000;
/// 单次远程查询 IN 列表的最大长度
pub const DEFAULT_MAX_IN_LIST: usize = 1000;
/// 遍历输出缓冲软上限
pub const DEFAULT_OUTPUT_SOFT_CAP: usize = 10_000;
/// 延迟邻接表批量构造的批次大小
pub const DEFAULT_ADJACENCY_BATCH_SIZE: usize = 1000;

/// 执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub traversal_batch_size: usize,
    pub max_in_list: usize,
    pub output_soft_cap: usize,
    pub adjacency_batch_size: usize,
    /// 是否持久化反向边；关闭时反向边只在缓存中以虚拟条目存在
    pub use_reverse_edges: bool,
    /// 内联邻接表允许的最大边数，`None` 表示从不溢出
    pub edge_spill_threshold: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            traversal_batch_size: DEFAULT_TRAVERSAL_BATCH_SIZE,
            max_in_list: DEFAULT_MAX_IN_LIST,
            output_soft_cap: DEFAULT_OUTPUT_SOFT_CAP,
            adjacency_batch_size: DEFAULT_ADJACENCY_BATCH_SIZE,
            use_reverse_edges: true,
            edge_spill_threshold: Some(1024),
        }
    }
}

impl ExecutionConfig {
    /// 从 JSON 字符串加载，缺失字段取默认值
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: ExecutionConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.traversal_batch_size == 0 {
            return Err(Error::Config("traversal_batch_size 必须大于 0".to_string()));
        }
        if self.max_in_list == 0 {
            return Err(Error::Config("max_in_list 必须大于 0".to_string()));
        }
        if self.adjacency_batch_size == 0 {
            return Err(Error::Config("adjacency_batch_size 必须大于 0".to_string()));
        }
        if self.edge_spill_threshold == Some(0) {
            return Err(Error::Config("edge_spill_threshold 不能为 0".to_string()));
        }
        Ok(())
    }

    pub fn with_reverse_edges(mut self, enabled: bool) -> Self {
        self.use_reverse_edges = enabled;
        self
    }

    pub fn with_spill_threshold(mut self, threshold: Option<usize>) -> Self {
        self.edge_spill_threshold = threshold;
        self
    }

    pub fn with_max_in_list(mut self, max: usize) -> Self {
        self.max_in_list = max;
        self
    }

    pub fn with_traversal_batch_size(mut self, size: usize) -> Self {
        self.traversal_batch_size = size;
        self
    }

    pub fn with_adjacency_batch_size(mut self, size: usize) -> Self {
        self.adjacency_batch_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ExecutionConfig::from_json_str(r#"{"max_in_list": 50, "use_reverse_edges": false}"#)
                .unwrap();
        assert_eq!(config.max_in_list, 50);
        assert!(!config.use_reverse_edges);
        assert_eq!(config.traversal_batch_size, DEFAULT_TRAVERSAL_BATCH_SIZE);
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = ExecutionConfig::from_json_str(r#"{"traversal_batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_null_threshold_disables_spill() {
        let config = ExecutionConfig::from_json_str(r#"{"edge_spill_threshold": null}"#).unwrap();
        assert_eq!(config.edge_spill_threshold, None);
    }
}
