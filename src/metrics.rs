//! 执行指标收集模块
//!
//! 统计远程往返次数与会话缓存命中情况，支持 Prometheus 格式导出

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 执行期全局指标
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    /// 存储往返统计
    store_stats: StoreStats,
    /// 顶点缓存统计
    cache_stats: CacheStats,
}

/// 存储往返统计
#[derive(Debug, Default)]
struct StoreStats {
    /// 顶点查询次数（每个 IN 列表分块计一次）
    vertex_queries: AtomicU64,
    /// 按 ID 读取文档次数
    document_reads: AtomicU64,
    /// 文档写入/删除次数
    document_writes: AtomicU64,
    /// 批量命令次数
    bulk_commands: AtomicU64,
    /// 溢出邻接表构造调用次数
    adjacency_constructions: AtomicU64,
}

/// 顶点缓存统计
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    /// 邻接表由内联转为溢出的次数
    spills: AtomicU64,
}

/// 可导出的指标快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub vertex_queries: u64,
    pub document_reads: u64,
    pub document_writes: u64,
    pub bulk_commands: u64,
    pub adjacency_constructions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache_evictions: u64,
    pub spills: u64,
}

impl MetricsSnapshot {
    /// 远程往返总次数
    pub fn round_trips(&self) -> u64 {
        self.vertex_queries
            + self.document_reads
            + self.document_writes
            + self.bulk_commands
            + self.adjacency_constructions
    }
}

/// Prometheus 格式指标
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    pub content: String,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_vertex_query(&self) {
        self.store_stats.vertex_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_read(&self) {
        self.store_stats.document_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_write(&self) {
        self.store_stats.document_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bulk_command(&self) {
        self.store_stats.bulk_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adjacency_construction(&self) {
        self.store_stats
            .adjacency_constructions
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_stats.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_stats.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.cache_stats.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spill(&self) {
        self.cache_stats.spills.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.cache_stats.hits.load(Ordering::Relaxed);
        let misses = self.cache_stats.misses.load(Ordering::Relaxed);

        let cache_hit_rate = if hits + misses > 0 {
            (hits as f64) / ((hits + misses) as f64)
        } else {
            0.0
        };

        MetricsSnapshot {
            vertex_queries: self.store_stats.vertex_queries.load(Ordering::Relaxed),
            document_reads: self.store_stats.document_reads.load(Ordering::Relaxed),
            document_writes: self.store_stats.document_writes.load(Ordering::Relaxed),
            bulk_commands: self.store_stats.bulk_commands.load(Ordering::Relaxed),
            adjacency_constructions: self
                .store_stats
                .adjacency_constructions
                .load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            cache_evictions: self.cache_stats.evictions.load(Ordering::Relaxed),
            spills: self.cache_stats.spills.load(Ordering::Relaxed),
        }
    }

    /// 导出为 Prometheus 格式
    pub fn to_prometheus(&self) -> PrometheusMetrics {
        let snapshot = self.snapshot();

        let counters: [(&str, &str, u64); 9] = [
            (
                "docgraph_vertex_queries_total",
                "Remote vertex queries issued (one per IN-list chunk)",
                snapshot.vertex_queries,
            ),
            (
                "docgraph_document_reads_total",
                "Documents read by id",
                snapshot.document_reads,
            ),
            (
                "docgraph_document_writes_total",
                "Documents replaced or deleted",
                snapshot.document_writes,
            ),
            (
                "docgraph_bulk_commands_total",
                "Bulk commands executed",
                snapshot.bulk_commands,
            ),
            (
                "docgraph_adjacency_constructions_total",
                "Batched spilled adjacency list constructions",
                snapshot.adjacency_constructions,
            ),
            (
                "docgraph_cache_hits_total",
                "Vertex cache hits",
                snapshot.cache_hits,
            ),
            (
                "docgraph_cache_misses_total",
                "Vertex cache misses",
                snapshot.cache_misses,
            ),
            (
                "docgraph_cache_evictions_total",
                "Vertices evicted from the session cache",
                snapshot.cache_evictions,
            ),
            (
                "docgraph_spills_total",
                "Adjacency lists moved from inline to spilled storage",
                snapshot.spills,
            ),
        ];

        let mut content = String::new();
        for (name, help, value) in counters {
            content.push_str(&format!("# HELP {} {}\n", name, help));
            content.push_str(&format!("# TYPE {} counter\n", name));
            content.push_str(&format!("{} {}\n", name, value));
        }

        content.push_str("# HELP docgraph_cache_hit_rate Vertex cache hit rate (0-1)\n");
        content.push_str("# TYPE docgraph_cache_hit_rate gauge\n");
        content.push_str(&format!(
            "docgraph_cache_hit_rate {:.4}\n",
            snapshot.cache_hit_rate
        ));

        PrometheusMetrics { content }
    }

    /// 重置所有指标
    pub fn reset(&self) {
        self.store_stats.vertex_queries.store(0, Ordering::Relaxed);
        self.store_stats.document_reads.store(0, Ordering::Relaxed);
        self.store_stats.document_writes.store(0, Ordering::Relaxed);
        self.store_stats.bulk_commands.store(0, Ordering::Relaxed);
        self.store_stats
            .adjacency_constructions
            .store(0, Ordering::Relaxed);

        self.cache_stats.hits.store(0, Ordering::Relaxed);
        self.cache_stats.misses.store(0, Ordering::Relaxed);
        self.cache_stats.evictions.store(0, Ordering::Relaxed);
        self.cache_stats.spills.store(0, Ordering::Relaxed);
    }
}

/// 全局指标实例
static METRICS: once_cell::sync::Lazy<Arc<ExecutionMetrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(ExecutionMetrics::new()));

/// 获取全局指标实例
pub fn global_metrics() -> Arc<ExecutionMetrics> {
    METRICS.clone()
}
