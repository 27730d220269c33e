//! 内存文档存储
//!
//! 实现全部存储协作者接口，文档格式见 `document` 模块。
//! 每次接口调用记一次往返，便于测试批量策略。

use super::bulk::{BulkCommand, BulkOutcome, EdgeSide};
use super::document::{
    is_edge_document, is_reserved_vertex_key, side_keys, KEY_EDGE, KEY_ETAG, KEY_ID,
    KEY_IS_REVERSE, KEY_META, KEY_PARTITION, KEY_PROP_ID, KEY_SINK_V, KEY_SRC_V, KEY_VERTEX_ID,
};
use super::{
    AdjacencyPages, BulkExecutor, Document, DocumentReader, DocumentWriter, EdgeDocumentHelper,
    JsonQuery, StoredEdge,
};
use crate::error::{Error, Result};
use crate::metrics::{ExecutionMetrics, MetricsSnapshot};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    doc: Document,
    etag: String,
}

type DocumentTable = IndexMap<String, StoredDocument>;

/// 边在存储中的位置
#[derive(Debug, Clone, PartialEq)]
enum EdgeLocation {
    /// 顶点文档内联列表中的下标
    Inline(usize),
    /// 溢出页 ID 与页内下标
    Page(String, usize),
}

/// 内存文档存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<DocumentTable>,
    etag_seq: AtomicU64,
    /// 本存储收到的请求统计
    requests: ExecutionMetrics,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一个文档（不计往返），返回 etag
    pub fn insert_document(&self, mut doc: Document) -> Result<String> {
        doc.remove(KEY_ETAG);
        let id = doc
            .get(KEY_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedDocument("文档缺少 id".to_string()))?
            .to_string();
        let etag = self.next_etag();
        self.documents.write().insert(
            id,
            StoredDocument {
                doc,
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    /// 查看文档当前内容（不计往返）
    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).map(with_etag)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// 某个顶点某一侧的溢出页 ID
    pub fn edge_pages(&self, vertex_id: &str, side: EdgeSide) -> Vec<String> {
        page_ids(&self.documents.read(), vertex_id, side)
    }

    /// 请求统计快照
    pub fn requests(&self) -> MetricsSnapshot {
        self.requests.snapshot()
    }

    pub fn reset_requests(&self) {
        self.requests.reset();
    }

    fn next_etag(&self) -> String {
        (self.etag_seq.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    fn touch(&self, docs: &mut DocumentTable, id: &str) -> Option<String> {
        let etag = self.next_etag();
        docs.get_mut(id).map(|stored| {
            stored.etag = etag.clone();
            etag
        })
    }

    fn new_page(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        side: EdgeSide,
        edges: Vec<Value>,
    ) -> String {
        let page_id = format!("{}_edges_{}", vertex_id, Uuid::new_v4().simple());
        let mut page = Document::new();
        page.insert(KEY_ID.to_string(), json!(page_id));
        page.insert(KEY_PARTITION.to_string(), json!(vertex_id));
        page.insert(KEY_VERTEX_ID.to_string(), json!(vertex_id));
        page.insert(KEY_IS_REVERSE.to_string(), json!(side.is_reverse()));
        page.insert(KEY_EDGE.to_string(), Value::Array(edges));
        docs.insert(
            page_id.clone(),
            StoredDocument {
                doc: page,
                etag: self.next_etag(),
            },
        );
        page_id
    }

    /// 把内联边全部移到一个新的溢出页
    fn spill_inline(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        side: EdgeSide,
        extra: Option<Value>,
    ) -> Result<String> {
        let (list_key, spilled_key, latest_key) = side_keys(side);
        let vdoc = vertex_mut(docs, vertex_id)?;
        let mut edges = std::mem::take(edge_list_mut(vdoc, list_key)?);
        edges.extend(extra);
        let moved = edges.len();

        let page_id = self.new_page(docs, vertex_id, side, edges);
        let vdoc = vertex_mut(docs, vertex_id)?;
        vdoc.insert(spilled_key.to_string(), Value::Bool(true));
        vdoc.insert(latest_key.to_string(), json!(page_id));

        debug!(
            "邻接表溢出: vertex={} side={:?} edges={} page={}",
            vertex_id, side, moved, page_id
        );
        Ok(page_id)
    }

    fn add_edge(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        edge: Value,
        side: EdgeSide,
        spill_threshold: Option<usize>,
    ) -> Result<BulkOutcome> {
        let (list_key, _, latest_key) = side_keys(side);
        let capacity = spill_threshold.unwrap_or(usize::MAX);
        let mut outcome = BulkOutcome::found();

        let vdoc = vertex_ref(docs, vertex_id)?;
        if self.is_spilled_vertex(vdoc, side.is_reverse()) {
            let latest = vdoc
                .get(latest_key)
                .and_then(Value::as_str)
                .map(str::to_string);
            let latest_len = latest
                .as_ref()
                .and_then(|id| docs.get(id))
                .map(|stored| edge_list(&stored.doc, KEY_EDGE).len());

            let page_id = match (latest, latest_len) {
                (Some(page_id), Some(len)) if len < capacity => {
                    edge_list_mut(page_mut(docs, &page_id)?, KEY_EDGE)?.push(edge);
                    self.touch(docs, &page_id);
                    page_id
                }
                _ => {
                    let page_id = self.new_page(docs, vertex_id, side, vec![edge]);
                    vertex_mut(docs, vertex_id)?.insert(latest_key.to_string(), json!(page_id));
                    page_id
                }
            };
            outcome.doc_id = Some(page_id);
        } else if edge_list(vdoc, list_key).len() + 1 > capacity {
            let page_id = self.spill_inline(docs, vertex_id, side, Some(edge))?;
            outcome.did_spill = true;
            outcome.doc_id = Some(page_id);
        } else {
            edge_list_mut(vertex_mut(docs, vertex_id)?, list_key)?.push(edge);
        }

        outcome.etag = self.touch(docs, vertex_id);
        Ok(outcome)
    }

    fn drop_edge(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
    ) -> Result<BulkOutcome> {
        let location = match locate_edge(docs, vertex_id, edge_id, side)? {
            Some(location) => location,
            None => return Ok(BulkOutcome::not_found()),
        };
        let (list_key, _, latest_key) = side_keys(side);

        let removed = match &location {
            EdgeLocation::Inline(i) => {
                edge_list_mut(vertex_mut(docs, vertex_id)?, list_key)?.remove(*i)
            }
            EdgeLocation::Page(page_id, i) => {
                edge_list_mut(page_mut(docs, page_id)?, KEY_EDGE)?.remove(*i)
            }
        };

        let mut outcome = BulkOutcome::found();
        let other_key = if side.is_reverse() { KEY_SRC_V } else { KEY_SINK_V };
        outcome.other_vertex_id = removed
            .get(other_key)
            .and_then(Value::as_str)
            .map(str::to_string);

        if let EdgeLocation::Page(page_id, _) = &location {
            let is_latest = vertex_ref(docs, vertex_id)?
                .get(latest_key)
                .and_then(Value::as_str)
                == Some(page_id.as_str());
            let is_empty = docs
                .get(page_id)
                .map_or(false, |stored| edge_list(&stored.doc, KEY_EDGE).is_empty());
            if is_empty && !is_latest {
                docs.shift_remove(page_id);
                trace!("删除空溢出页: {}", page_id);
            } else {
                self.touch(docs, page_id);
            }
            outcome.doc_id = Some(page_id.clone());
        }

        outcome.etag = self.touch(docs, vertex_id);
        Ok(outcome)
    }

    fn update_edge(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
        properties: &[(String, Value)],
        spill_threshold: Option<usize>,
    ) -> Result<BulkOutcome> {
        let location = match locate_edge(docs, vertex_id, edge_id, side)? {
            Some(location) => location,
            None => return Ok(BulkOutcome::not_found()),
        };

        let edge = located_edge_mut(docs, vertex_id, side, &location)?;
        let obj = edge
            .as_object_mut()
            .ok_or_else(|| Error::MalformedDocument(format!("边 {} 不是对象", edge_id)))?;
        for (name, value) in properties {
            obj.insert(name.clone(), value.clone());
        }

        let mut outcome = BulkOutcome::found();
        match location {
            EdgeLocation::Page(page_id, _) => {
                self.touch(docs, &page_id);
                outcome.doc_id = Some(page_id);
            }
            EdgeLocation::Inline(_) => {
                let (list_key, _, _) = side_keys(side);
                let inline = edge_list(vertex_ref(docs, vertex_id)?, list_key).len();
                if spill_threshold.map_or(false, |t| inline > t) {
                    let page_id = self.spill_inline(docs, vertex_id, side, None)?;
                    outcome.did_spill = true;
                    outcome.doc_id = Some(page_id);
                }
            }
        }

        outcome.etag = self.touch(docs, vertex_id);
        Ok(outcome)
    }

    fn drop_edge_property(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
        names: &[String],
    ) -> Result<BulkOutcome> {
        let location = match locate_edge(docs, vertex_id, edge_id, side)? {
            Some(location) => location,
            None => return Ok(BulkOutcome::not_found()),
        };

        let edge = located_edge_mut(docs, vertex_id, side, &location)?;
        if let Some(obj) = edge.as_object_mut() {
            for name in names {
                obj.remove(name);
            }
        }

        let mut outcome = BulkOutcome::found();
        if let EdgeLocation::Page(page_id, _) = location {
            self.touch(docs, &page_id);
            outcome.doc_id = Some(page_id);
        }
        outcome.etag = self.touch(docs, vertex_id);
        Ok(outcome)
    }

    fn drop_vertex_property(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        name: &str,
    ) -> Result<BulkOutcome> {
        if is_reserved_vertex_key(name) {
            return Err(Error::InvalidTarget(format!("保留键不能作为属性删除: {}", name)));
        }
        let found = vertex_mut(docs, vertex_id)?.remove(name).is_some();
        Ok(self.property_outcome(docs, vertex_id, found))
    }

    fn drop_single_property(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        name: &str,
        property_id: &str,
    ) -> Result<BulkOutcome> {
        let vdoc = vertex_mut(docs, vertex_id)?;
        let (found, now_empty) = match vdoc.get_mut(name).and_then(Value::as_array_mut) {
            Some(items) => {
                let before = items.len();
                items.retain(|item| {
                    item.get(KEY_PROP_ID).and_then(Value::as_str) != Some(property_id)
                });
                (items.len() != before, items.is_empty())
            }
            None => (false, false),
        };
        if now_empty {
            vdoc.remove(name);
        }
        Ok(self.property_outcome(docs, vertex_id, found))
    }

    fn drop_meta_property(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        name: &str,
        property_id: &str,
        meta_name: &str,
    ) -> Result<BulkOutcome> {
        let vdoc = vertex_mut(docs, vertex_id)?;
        let found = vdoc
            .get_mut(name)
            .and_then(Value::as_array_mut)
            .and_then(|items| {
                items
                    .iter_mut()
                    .find(|item| item.get(KEY_PROP_ID).and_then(Value::as_str) == Some(property_id))
            })
            .and_then(|item| item.get_mut(KEY_META))
            .and_then(Value::as_object_mut)
            .map_or(false, |meta| meta.remove(meta_name).is_some());
        Ok(self.property_outcome(docs, vertex_id, found))
    }

    fn property_outcome(
        &self,
        docs: &mut DocumentTable,
        vertex_id: &str,
        found: bool,
    ) -> BulkOutcome {
        if !found {
            return BulkOutcome::not_found();
        }
        let mut outcome = BulkOutcome::found();
        outcome.etag = self.touch(docs, vertex_id);
        outcome
    }

    fn edges_of(
        docs: &DocumentTable,
        vertex_id: &str,
        side: EdgeSide,
    ) -> Result<Vec<StoredEdge>> {
        let (list_key, _, _) = side_keys(side);
        let vdoc = vertex_ref(docs, vertex_id)?;
        let mut edges: Vec<StoredEdge> = edge_list(vdoc, list_key)
            .iter()
            .map(|e| StoredEdge {
                edge: e.clone(),
                doc_id: None,
            })
            .collect();
        for page_id in page_ids(docs, vertex_id, side) {
            if let Some(stored) = docs.get(&page_id) {
                edges.extend(edge_list(&stored.doc, KEY_EDGE).iter().map(|e| StoredEdge {
                    edge: e.clone(),
                    doc_id: Some(page_id.clone()),
                }));
            }
        }
        Ok(edges)
    }

    /// 反向边关闭时：扫描所有顶点的出边，找出以该顶点为汇的边
    fn virtual_reverse_edges(docs: &DocumentTable, vertex_id: &str) -> Result<Vec<StoredEdge>> {
        let mut result = Vec::new();
        let sources: Vec<String> = docs
            .iter()
            .filter(|(_, stored)| !is_edge_document(&stored.doc))
            .map(|(id, _)| id.clone())
            .collect();
        for src in sources {
            for stored in Self::edges_of(docs, &src, EdgeSide::Forward)? {
                if stored.edge.get(KEY_SINK_V).and_then(Value::as_str) == Some(vertex_id) {
                    result.push(StoredEdge {
                        edge: stored.edge,
                        doc_id: None,
                    });
                }
            }
        }
        Ok(result)
    }

    fn check_if_match(docs: &DocumentTable, id: &str, if_match: Option<&str>) -> Result<()> {
        if let (Some(expected), Some(stored)) = (if_match, docs.get(id)) {
            if stored.etag != expected {
                return Err(Error::ConcurrencyConflict { id: id.to_string() });
            }
        }
        Ok(())
    }

    fn replace_or_delete(
        &self,
        docs: &mut DocumentTable,
        id: &str,
        document: Option<&Document>,
    ) -> Option<String> {
        match document {
            Some(doc) => {
                let mut doc = doc.clone();
                doc.remove(KEY_ETAG);
                let etag = self.next_etag();
                docs.insert(
                    id.to_string(),
                    StoredDocument {
                        doc,
                        etag: etag.clone(),
                    },
                );
                Some(etag)
            }
            None => {
                if docs.shift_remove(id).is_some() {
                    // 顶点删除时连同它的溢出页一起删除
                    let pages: Vec<String> = docs
                        .iter()
                        .filter(|(_, s)| {
                            s.doc.get(KEY_VERTEX_ID).and_then(Value::as_str) == Some(id)
                        })
                        .map(|(page_id, _)| page_id.clone())
                        .collect();
                    for page in pages {
                        docs.shift_remove(&page);
                    }
                }
                None
            }
        }
    }
}

fn with_etag(stored: &StoredDocument) -> Document {
    let mut doc = stored.doc.clone();
    doc.insert(KEY_ETAG.to_string(), json!(stored.etag));
    doc
}

fn vertex_ref<'a>(docs: &'a DocumentTable, id: &str) -> Result<&'a Document> {
    match docs.get(id) {
        Some(stored) if !is_edge_document(&stored.doc) => Ok(&stored.doc),
        _ => Err(Error::VertexNotFound(id.to_string())),
    }
}

fn vertex_mut<'a>(docs: &'a mut DocumentTable, id: &str) -> Result<&'a mut Document> {
    match docs.get_mut(id) {
        Some(stored) if !is_edge_document(&stored.doc) => Ok(&mut stored.doc),
        _ => Err(Error::VertexNotFound(id.to_string())),
    }
}

fn page_mut<'a>(docs: &'a mut DocumentTable, id: &str) -> Result<&'a mut Document> {
    docs.get_mut(id)
        .map(|stored| &mut stored.doc)
        .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
}

fn edge_list<'a>(doc: &'a Document, key: &str) -> &'a [Value] {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or(&[])
}

fn edge_list_mut<'a>(doc: &'a mut Document, key: &str) -> Result<&'a mut Vec<Value>> {
    doc.entry(key.to_string())
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| Error::MalformedDocument(format!("{} 必须是数组", key)))
}

fn page_ids(docs: &DocumentTable, vertex_id: &str, side: EdgeSide) -> Vec<String> {
    docs.iter()
        .filter(|(_, stored)| {
            stored.doc.get(KEY_VERTEX_ID).and_then(Value::as_str) == Some(vertex_id)
                && stored.doc.get(KEY_IS_REVERSE).and_then(Value::as_bool)
                    == Some(side.is_reverse())
        })
        .map(|(id, _)| id.clone())
        .collect()
}

fn position_of(edges: &[Value], edge_id: &str) -> Option<usize> {
    edges
        .iter()
        .position(|e| e.get(KEY_ID).and_then(Value::as_str) == Some(edge_id))
}

fn locate_edge(
    docs: &DocumentTable,
    vertex_id: &str,
    edge_id: &str,
    side: EdgeSide,
) -> Result<Option<EdgeLocation>> {
    let (list_key, _, _) = side_keys(side);
    let vdoc = vertex_ref(docs, vertex_id)?;
    if let Some(i) = position_of(edge_list(vdoc, list_key), edge_id) {
        return Ok(Some(EdgeLocation::Inline(i)));
    }
    for page_id in page_ids(docs, vertex_id, side) {
        if let Some(stored) = docs.get(&page_id) {
            if let Some(i) = position_of(edge_list(&stored.doc, KEY_EDGE), edge_id) {
                return Ok(Some(EdgeLocation::Page(page_id, i)));
            }
        }
    }
    Ok(None)
}

fn located_edge_mut<'a>(
    docs: &'a mut DocumentTable,
    vertex_id: &str,
    side: EdgeSide,
    location: &EdgeLocation,
) -> Result<&'a mut Value> {
    let (list_key, _, _) = side_keys(side);
    let (doc, key, index) = match location {
        EdgeLocation::Inline(i) => (vertex_mut(docs, vertex_id)?, list_key, *i),
        EdgeLocation::Page(page_id, i) => (page_mut(docs, page_id)?, KEY_EDGE, *i),
    };
    edge_list_mut(doc, key)?
        .get_mut(index)
        .ok_or_else(|| Error::Internal(format!("边位置越界: {}", index)))
}

impl DocumentReader for MemoryStore {
    fn get_vertices(&self, query: &JsonQuery) -> Result<Vec<Document>> {
        self.requests.record_vertex_query();
        trace!("get_vertices: {}", query);
        let docs = self.documents.read();
        Ok(docs
            .values()
            .filter(|stored| !is_edge_document(&stored.doc) && query.matches(&stored.doc))
            .map(with_etag)
            .collect())
    }

    fn retrieve_document_by_id(&self, id: &str) -> Result<Option<Document>> {
        self.requests.record_document_read();
        Ok(self.documents.read().get(id).map(with_etag))
    }
}

impl DocumentWriter for MemoryStore {
    fn replace_or_delete_document(
        &self,
        id: &str,
        document: Option<&Document>,
        _partition_key: &str,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        self.requests.record_document_write();
        let mut docs = self.documents.write();
        Self::check_if_match(&docs, id, if_match)?;
        Ok(self.replace_or_delete(&mut docs, id, document))
    }

    fn replace_or_delete_documents(
        &self,
        batch: &IndexMap<String, (Option<Document>, String)>,
    ) -> Result<HashMap<String, Option<String>>> {
        self.requests.record_document_write();
        let mut docs = self.documents.write();
        let mut etags = HashMap::with_capacity(batch.len());
        for (id, (document, _partition_key)) in batch {
            let etag = self.replace_or_delete(&mut docs, id, document.as_ref());
            etags.insert(id.clone(), etag);
        }
        Ok(etags)
    }
}

impl BulkExecutor for MemoryStore {
    fn execute(&self, command: BulkCommand) -> Result<BulkOutcome> {
        self.requests.record_bulk_command();
        trace!("bulk {} on {:?}", command.name(), command.vertex_id());
        let mut docs = self.documents.write();
        match command {
            BulkCommand::AddVertex { mut document } => {
                document.remove(KEY_ETAG);
                let id = document
                    .get(KEY_ID)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::MalformedDocument("新顶点缺少 id".to_string()))?
                    .to_string();
                if docs.contains_key(&id) {
                    return Err(Error::Storage(format!("文档已存在: {}", id)));
                }
                let etag = self.next_etag();
                docs.insert(
                    id,
                    StoredDocument {
                        doc: document,
                        etag: etag.clone(),
                    },
                );
                let mut outcome = BulkOutcome::found();
                outcome.etag = Some(etag);
                Ok(outcome)
            }
            BulkCommand::AddEdge {
                vertex_id,
                edge,
                side,
                spill_threshold,
            } => self.add_edge(&mut docs, &vertex_id, edge, side, spill_threshold),
            BulkCommand::DropEdge {
                vertex_id,
                edge_id,
                side,
            } => self.drop_edge(&mut docs, &vertex_id, &edge_id, side),
            BulkCommand::DropVertexProperty { vertex_id, name } => {
                self.drop_vertex_property(&mut docs, &vertex_id, &name)
            }
            BulkCommand::DropVertexSingleProperty {
                vertex_id,
                name,
                property_id,
            } => self.drop_single_property(&mut docs, &vertex_id, &name, &property_id),
            BulkCommand::DropVertexSinglePropertyMetaProperty {
                vertex_id,
                name,
                property_id,
                meta_name,
            } => self.drop_meta_property(&mut docs, &vertex_id, &name, &property_id, &meta_name),
            BulkCommand::UpdateEdgeProperty {
                vertex_id,
                edge_id,
                side,
                properties,
                spill_threshold,
            } => self.update_edge(
                &mut docs,
                &vertex_id,
                &edge_id,
                side,
                &properties,
                spill_threshold,
            ),
            BulkCommand::DropEdgeProperty {
                vertex_id,
                edge_id,
                side,
                names,
            } => self.drop_edge_property(&mut docs, &vertex_id, &edge_id, side, &names),
        }
    }
}

impl EdgeDocumentHelper for MemoryStore {
    fn find_edge_by_source_and_edge_id(
        &self,
        src_id: &str,
        edge_id: &str,
    ) -> Result<Option<StoredEdge>> {
        self.requests.record_document_read();
        let docs = self.documents.read();
        Ok(Self::edges_of(&docs, src_id, EdgeSide::Forward)?
            .into_iter()
            .find(|stored| stored.edge.get(KEY_ID).and_then(Value::as_str) == Some(edge_id)))
    }

    fn construct_spilled_adjacency_lists(
        &self,
        vertex_ids: &[String],
        use_reverse_edges: bool,
    ) -> Result<HashMap<String, AdjacencyPages>> {
        self.requests.record_adjacency_construction();
        debug!("构造邻接表: {} 个顶点", vertex_ids.len());
        let docs = self.documents.read();
        let mut result = HashMap::with_capacity(vertex_ids.len());
        for id in vertex_ids {
            if vertex_ref(&docs, id).is_err() {
                continue;
            }
            let forward = Self::edges_of(&docs, id, EdgeSide::Forward)?;
            let reverse = if use_reverse_edges {
                Self::edges_of(&docs, id, EdgeSide::Reverse)?
            } else {
                Self::virtual_reverse_edges(&docs, id)?
            };
            result.insert(id.clone(), AdjacencyPages { forward, reverse });
        }
        Ok(result)
    }

    fn is_spilled_vertex(&self, document: &Document, reverse: bool) -> bool {
        let (_, spilled_key, _) = side_keys(EdgeSide::from_reverse(reverse));
        document.get(spilled_key).and_then(Value::as_bool) == Some(true)
    }

    fn remove_edge(&self, vertex_id: &str, edge_id: &str, side: EdgeSide) -> Result<BulkOutcome> {
        self.requests.record_bulk_command();
        let mut docs = self.documents.write();
        self.drop_edge(&mut docs, vertex_id, edge_id, side)
    }

    fn update_edge_property(
        &self,
        vertex_id: &str,
        edge_id: &str,
        side: EdgeSide,
        properties: &[(String, Value)],
        spill_threshold: Option<usize>,
    ) -> Result<BulkOutcome> {
        self.requests.record_bulk_command();
        let mut docs = self.documents.write();
        self.update_edge(&mut docs, vertex_id, edge_id, side, properties, spill_threshold)
    }
}
