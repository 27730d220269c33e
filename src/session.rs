//! 图会话
//!
//! 每个连接一个会话：持有存储协作者、执行配置和顶点缓存。
//! 算子在构造时拿到会话句柄，所有远程访问都经过这里，
//! 缓存只在存储写入成功之后更新。

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::graph::{EdgeField, VertexCache, VertexField, VertexRef};
use crate::metrics::{global_metrics, ExecutionMetrics};
use crate::storage::document::{self, edge_from_json, etag_of, is_edge_document};
use crate::storage::{
    BulkCommand, BulkExecutor, BulkOutcome, Document, DocumentReader, DocumentWriter,
    EdgeDocumentHelper, EdgeSide, JsonQuery, StoredEdge,
};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub type SessionRef = Rc<GraphSession>;

pub struct GraphSession {
    config: ExecutionConfig,
    reader: Rc<dyn DocumentReader>,
    writer: Rc<dyn DocumentWriter>,
    bulk: Rc<dyn BulkExecutor>,
    edge_docs: Rc<dyn EdgeDocumentHelper>,
    cache: RefCell<VertexCache>,
    metrics: Arc<ExecutionMetrics>,
}

impl GraphSession {
    /// 用同时实现全部协作者接口的存储创建会话
    pub fn new<S>(store: Rc<S>, config: ExecutionConfig) -> SessionRef
    where
        S: DocumentReader + DocumentWriter + BulkExecutor + EdgeDocumentHelper + 'static,
    {
        Self::with_collaborators(store.clone(), store.clone(), store.clone(), store, config)
    }

    pub fn with_collaborators(
        reader: Rc<dyn DocumentReader>,
        writer: Rc<dyn DocumentWriter>,
        bulk: Rc<dyn BulkExecutor>,
        edge_docs: Rc<dyn EdgeDocumentHelper>,
        config: ExecutionConfig,
    ) -> SessionRef {
        Rc::new(Self {
            config,
            reader,
            writer,
            bulk,
            edge_docs,
            cache: RefCell::new(VertexCache::new()),
            metrics: global_metrics(),
        })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    pub fn use_reverse_edges(&self) -> bool {
        self.config.use_reverse_edges
    }

    pub fn spill_threshold(&self) -> Option<usize> {
        self.config.edge_spill_threshold
    }

    // ==================== 存储访问 ====================

    pub fn query_vertices(&self, query: &JsonQuery) -> Result<Vec<Document>> {
        self.metrics.record_vertex_query();
        trace!("查询顶点: {}", query);
        self.reader.get_vertices(query)
    }

    /// 按 ID 读取文档，并记录其 etag
    pub fn retrieve_document(&self, id: &str) -> Result<Option<Document>> {
        self.metrics.record_document_read();
        let doc = self.reader.retrieve_document_by_id(id)?;
        if let Some(doc) = &doc {
            self.cache.borrow_mut().set_etag(id, etag_of(doc));
        }
        Ok(doc)
    }

    /// 替换或删除文档，使用缓存的 etag 做乐观并发检查
    pub fn write_document(
        &self,
        id: &str,
        document: Option<&Document>,
        partition_key: &str,
    ) -> Result<Option<String>> {
        self.metrics.record_document_write();
        let if_match = self.cache.borrow().etag(id).map(|s| s.to_string());
        let etag =
            self.writer
                .replace_or_delete_document(id, document, partition_key, if_match.as_deref())?;
        self.cache.borrow_mut().set_etag(id, etag.clone());
        Ok(etag)
    }

    pub fn bulk(&self, command: BulkCommand) -> Result<BulkOutcome> {
        self.metrics.record_bulk_command();
        let vertex_id = command.vertex_id().map(|s| s.to_string());
        trace!("批量命令 {} on {:?}", command.name(), vertex_id);
        let outcome = self.bulk.execute(command)?;
        self.remember_etag(vertex_id.as_deref(), &outcome);
        Ok(outcome)
    }

    pub fn remove_edge(
        &self,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
    ) -> Result<BulkOutcome> {
        self.metrics.record_bulk_command();
        let outcome = self.edge_docs.remove_edge(vertex_id, edge_id, side)?;
        self.remember_etag(Some(vertex_id), &outcome);
        Ok(outcome)
    }

    pub fn update_edge_property(
        &self,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
        properties: &[(String, Value)],
    ) -> Result<BulkOutcome> {
        self.metrics.record_bulk_command();
        let outcome = self.edge_docs.update_edge_property(
            vertex_id,
            edge_id,
            side,
            properties,
            self.spill_threshold(),
        )?;
        self.remember_etag(Some(vertex_id), &outcome);
        Ok(outcome)
    }

    pub fn find_edge(&self, src_id: &str, edge_id: &str) -> Result<Option<StoredEdge>> {
        self.metrics.record_document_read();
        self.edge_docs.find_edge_by_source_and_edge_id(src_id, edge_id)
    }

    fn remember_etag(&self, vertex_id: Option<&str>, outcome: &BulkOutcome) {
        if let (Some(id), Some(etag)) = (vertex_id, &outcome.etag) {
            self.cache.borrow_mut().set_etag(id, Some(etag.clone()));
        }
    }

    // ==================== 顶点缓存 ====================

    pub fn cached_vertex(&self, id: &str) -> Option<VertexRef> {
        self.cache.borrow().get(id)
    }

    pub fn etag(&self, doc_id: &str) -> Option<String> {
        self.cache.borrow().etag(doc_id).map(|s| s.to_string())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// 取顶点：缓存命中直接返回，否则从存储读取并构造
    pub fn vertex(&self, id: &str) -> Result<Option<VertexRef>> {
        if let Some(v) = self.cached_vertex(id) {
            self.metrics.record_cache_hit();
            return Ok(Some(v));
        }
        self.metrics.record_cache_miss();

        match self.retrieve_document(id)? {
            Some(doc) if !is_edge_document(&doc) => self.vertex_from_document(&doc).map(Some),
            _ => Ok(None),
        }
    }

    /// 从顶点文档取得缓存中的顶点对象；同一 ID 永远只有一个对象
    pub fn vertex_from_document(&self, doc: &Document) -> Result<VertexRef> {
        let id = document::document_id(doc)?;
        if let Some(v) = self.cached_vertex(id) {
            return Ok(v);
        }

        let vertex =
            document::vertex_from_document(doc, self.edge_docs.as_ref(), self.use_reverse_edges())?;
        let mut cache = self.cache.borrow_mut();
        cache.set_etag(id, etag_of(doc));
        Ok(cache.insert_if_absent(vertex.into_ref()))
    }

    /// 缓存一个刚刚持久化的新顶点
    pub fn register_new_vertex(&self, vertex: VertexField, etag: Option<String>) -> VertexRef {
        let mut cache = self.cache.borrow_mut();
        cache.set_etag(vertex.id().to_string(), etag);
        cache.insert_if_absent(vertex.into_ref())
    }

    /// 从缓存中移除顶点；仍有邻接条目时拒绝
    pub fn evict_vertex(&self, id: &str) -> Result<()> {
        if let Some(v) = self.cached_vertex(id) {
            if !v.borrow().has_no_edges() {
                warn!("拒绝驱逐仍有边的顶点: {}", id);
                return Err(Error::InvariantViolation(format!(
                    "顶点 {} 仍有邻接条目，不能从缓存中移除",
                    id
                )));
            }
        }
        self.cache.borrow_mut().remove(id);
        self.metrics.record_eviction();
        Ok(())
    }

    /// 一次批量调用物化这些顶点中所有延迟的邻接表
    pub fn ensure_adjacency_fetched(&self, ids: &[String]) -> Result<()> {
        let mut pending: Vec<String> = Vec::new();
        for id in ids {
            if pending.contains(id) {
                continue;
            }
            if let Some(v) = self.cached_vertex(id) {
                if !v.borrow().is_fully_fetched() {
                    pending.push(id.clone());
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        debug!("批量构造延迟邻接表: {} 个顶点", pending.len());
        self.metrics.record_adjacency_construction();
        let mut pages = self
            .edge_docs
            .construct_spilled_adjacency_lists(&pending, self.use_reverse_edges())?;

        for id in &pending {
            let Some(vertex) = self.cached_vertex(id) else {
                continue;
            };
            let page = pages.remove(id).unwrap_or_default();
            let mut v = vertex.borrow_mut();

            if !v.adjacency().is_fetched() {
                let edges = page
                    .forward
                    .iter()
                    .map(|e| edge_from_json(&e.edge, false, e.doc_id.clone()))
                    .collect::<Result<Vec<_>>>()?;
                v.adjacency_mut().materialize(edges);
            }
            if !v.reverse_adjacency().is_fetched() {
                let edges = page
                    .reverse
                    .iter()
                    .map(|e| self.reverse_entry(e))
                    .collect::<Result<Vec<_>>>()?;
                v.reverse_adjacency_mut().materialize(edges);
            }
        }
        Ok(())
    }

    fn reverse_entry(&self, stored: &StoredEdge) -> Result<EdgeField> {
        if self.use_reverse_edges() {
            edge_from_json(&stored.edge, true, stored.doc_id.clone())
        } else {
            Ok(edge_from_json(&stored.edge, false, None)?.to_reverse(true))
        }
    }

    /// 边写入成功后同步缓存
    ///
    /// 写入使邻接表溢出且该表已物化时，表中所有边都重定向到新的溢出文档；
    /// 延迟的邻接表保持延迟。
    pub fn record_edge_added(
        &self,
        vertex: &VertexRef,
        reverse: bool,
        edge: EdgeField,
        outcome: &BulkOutcome,
    ) {
        let mut v = vertex.borrow_mut();
        let vertex_id = v.id().to_string();
        let list = v.adjacency_for_mut(reverse);

        if outcome.did_spill {
            self.metrics.record_spill();
        }
        if list.is_fetched() {
            if let (true, Some(doc_id)) = (outcome.did_spill, &outcome.doc_id) {
                debug!(
                    "邻接表溢出，重定向 {} 条缓存边: vertex={} doc={}",
                    list.len(),
                    vertex_id,
                    doc_id
                );
                list.redirect_document(doc_id);
            }
            list.insert(edge.with_doc_id(outcome.doc_id.clone()));
        }
        if outcome.doc_id.is_some() {
            v.set_latest_edge_doc_id(reverse, outcome.doc_id.clone());
        }
    }

    /// 边属性更新写入后同步缓存中的边
    pub fn record_edge_updated(
        &self,
        vertex: &VertexRef,
        reverse: bool,
        edge_id: &str,
        outcome: &BulkOutcome,
        apply: impl FnOnce(&mut EdgeField),
    ) {
        let mut v = vertex.borrow_mut();
        let list = v.adjacency_for_mut(reverse);
        if outcome.did_spill {
            self.metrics.record_spill();
            if let Some(doc_id) = &outcome.doc_id {
                list.redirect_document(doc_id);
            }
        }
        if let Some(edge) = list.get_mut(edge_id) {
            apply(edge);
        }
        if outcome.did_spill {
            v.set_latest_edge_doc_id(reverse, outcome.doc_id.clone());
        }
    }

    /// 会话结束
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AdjacencyListField;
    use crate::storage::document::new_vertex_document;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn session_with(store: &Rc<MemoryStore>, config: ExecutionConfig) -> SessionRef {
        GraphSession::new(store.clone(), config)
    }

    #[test]
    fn test_vertex_is_cached_once() {
        let store = Rc::new(MemoryStore::new());
        store.insert_document(new_vertex_document("a", "person")).unwrap();
        let session = session_with(&store, ExecutionConfig::default());

        let v1 = session.vertex("a").unwrap().unwrap();
        let v2 = session.vertex("a").unwrap().unwrap();
        assert!(Rc::ptr_eq(&v1, &v2));
        assert_eq!(store.requests().document_reads, 1);
        assert!(session.etag("a").is_some());
        assert!(session.vertex("missing").unwrap().is_none());
    }

    #[test]
    fn test_round_trips_reach_global_metrics() {
        let store = Rc::new(MemoryStore::new());
        store.insert_document(new_vertex_document("a", "person")).unwrap();
        let session = session_with(&store, ExecutionConfig::default());
        assert!(Arc::ptr_eq(session.metrics(), &global_metrics()));

        // 全局计数器由并行测试共享，只检查增量下限
        let before = session.metrics().snapshot();
        session.vertex("a").unwrap().unwrap();
        session.vertex("a").unwrap().unwrap();
        let after = session.metrics().snapshot();

        assert!(after.document_reads >= before.document_reads + 1);
        assert!(after.cache_misses >= before.cache_misses + 1);
        assert!(after.cache_hits >= before.cache_hits + 1);
    }

    #[test]
    fn test_evict_refuses_vertex_with_edges() {
        let store = Rc::new(MemoryStore::new());
        let session = session_with(&store, ExecutionConfig::default());

        let v = session.register_new_vertex(VertexField::new("a", "person"), None);
        v.borrow_mut()
            .adjacency_mut()
            .insert(EdgeField::new("e1", "knows", "a", "b"));

        let err = session.evict_vertex("a").unwrap_err();
        assert!(err.is_invariant_violation());

        v.borrow_mut().adjacency_mut().remove("e1");
        session.evict_vertex("a").unwrap();
        assert!(session.cached_vertex("a").is_none());
    }

    #[test]
    fn test_ensure_adjacency_fetched_single_call() {
        let store = Rc::new(MemoryStore::new());
        for id in ["a", "b"] {
            let mut doc = new_vertex_document(id, "person");
            doc.insert("_edgeSpilled".to_string(), json!(true));
            store.insert_document(doc).unwrap();
        }
        let session = session_with(&store, ExecutionConfig::default());
        let a = session.vertex("a").unwrap().unwrap();
        session.vertex("b").unwrap().unwrap();
        assert!(!a.borrow().adjacency().is_fetched());

        session
            .ensure_adjacency_fetched(&["a".to_string(), "b".to_string(), "a".to_string()])
            .unwrap();
        assert!(a.borrow().is_fully_fetched());
        assert_eq!(store.requests().adjacency_constructions, 1);

        // 已物化后不再调用
        session.ensure_adjacency_fetched(&["a".to_string()]).unwrap();
        assert_eq!(store.requests().adjacency_constructions, 1);
    }

    #[test]
    fn test_lazy_list_stays_lazy_on_edge_added() {
        let store = Rc::new(MemoryStore::new());
        let session = session_with(&store, ExecutionConfig::default());
        let mut vertex = VertexField::new("a", "person");
        vertex.set_adjacency(AdjacencyListField::lazy());
        let v = session.register_new_vertex(vertex, None);

        let outcome = BulkOutcome {
            found: true,
            did_spill: true,
            doc_id: Some("page-1".to_string()),
            ..BulkOutcome::default()
        };
        session.record_edge_added(&v, false, EdgeField::new("e1", "knows", "a", "b"), &outcome);

        assert!(!v.borrow().adjacency().is_fetched());
        assert_eq!(v.borrow().latest_out_edge_doc_id(), Some("page-1"));
    }
}
