//! 测试辅助：在内存存储上搭建小图

use crate::config::ExecutionConfig;
use crate::graph::{EdgeField, Field, RawRecord};
use crate::query::{
    AdjacencyListDecoder, BoxedOperator, ContextSource, ProjectColumnsOperator, TraversalOperator,
};
use crate::session::{GraphSession, SessionRef};
use crate::storage::document::{edge_to_json, new_vertex_document, single_property_json};
use crate::storage::{BulkCommand, BulkExecutor, EdgeSide, JsonQuery, MemoryStore};
use crate::types::Direction;
use serde_json::Value;
use std::rc::Rc;

pub struct TestGraph {
    pub store: Rc<MemoryStore>,
    pub session: SessionRef,
}

impl TestGraph {
    pub fn new(config: ExecutionConfig) -> Self {
        Self::with_store(Rc::new(MemoryStore::new()), config)
    }

    /// 在同一个存储上开一个新会话
    pub fn with_store(store: Rc<MemoryStore>, config: ExecutionConfig) -> Self {
        crate::logging::init_for_tests();
        let session = GraphSession::new(store.clone(), config);
        Self { store, session }
    }

    /// 链 ids[0] → ids[1] → ...，边 ID 为 `e{i}`
    pub fn chain(ids: &[&str]) -> Self {
        let graph = Self::new(ExecutionConfig::default());
        for id in ids {
            graph.add_vertex(id, "node", &[]);
        }
        for (i, pair) in ids.windows(2).enumerate() {
            graph.add_edge(&format!("e{}", i), "next", pair[0], pair[1]);
        }
        graph
    }

    pub fn reopen(&self, config: ExecutionConfig) -> Self {
        Self::with_store(self.store.clone(), config)
    }

    /// 直接写入顶点文档，不经过会话；请求计数随后清零
    pub fn add_vertex(&self, id: &str, label: &str, properties: &[(&str, Value)]) {
        let mut doc = new_vertex_document(id, label);
        for (i, (name, value)) in properties.iter().enumerate() {
            let entry = single_property_json(&format!("{}-p{}", id, i), value.clone(), &[]);
            doc.insert(name.to_string(), Value::Array(vec![entry]));
        }
        if let Err(e) = self.store.insert_document(doc) {
            panic!("seed vertex {}: {}", id, e);
        }
        self.store.reset_requests();
    }

    /// 同时写入正向和反向条目，不触发溢出
    pub fn add_edge(&self, id: &str, label: &str, src: &str, sink: &str) {
        self.add_edge_with(id, label, src, sink, &[], None);
    }

    pub fn add_edge_with(
        &self,
        id: &str,
        label: &str,
        src: &str,
        sink: &str,
        properties: &[(&str, Value)],
        spill_threshold: Option<usize>,
    ) {
        let mut edge = EdgeField::new(id, label, src, sink);
        for (name, value) in properties {
            edge.set_property(*name, crate::graph::StringField::from_json(value));
        }
        let json = edge_to_json(&edge);
        for (vertex_id, side) in [(src, EdgeSide::Forward), (sink, EdgeSide::Reverse)] {
            let result = self.store.execute(BulkCommand::AddEdge {
                vertex_id: vertex_id.to_string(),
                edge: json.clone(),
                side,
                spill_threshold,
            });
            if let Err(e) = result {
                panic!("seed edge {}: {}", id, e);
            }
        }
        self.store.reset_requests();
    }

    pub fn vertex_record(&self, id: &str) -> RawRecord {
        match self.session.vertex(id) {
            Ok(Some(v)) => RawRecord::single(Field::Vertex(v)),
            other => panic!("vertex {} not loadable: {:?}", id, other.map(|v| v.is_some())),
        }
    }

    /// 以给定顶点为起点的源
    pub fn source(&self, ids: &[&str]) -> ContextSource {
        let src = ContextSource::new();
        src.set_bucket(ids.iter().map(|id| self.vertex_record(id)).collect());
        src
    }
}

/// 每条记录某一列的值表示
pub fn column(records: &[RawRecord], index: usize) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get(index).map(|f| f.to_value()).unwrap_or_else(|| "null".to_string()))
        .collect()
}

/// 每条记录最后一列的值表示
pub fn last_column(records: &[RawRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| {
            r.len()
                .checked_sub(1)
                .and_then(|i| r.get(i))
                .map(|f| f.to_value())
                .unwrap_or_else(|| "null".to_string())
        })
        .collect()
}

pub fn values_source(values: &[&str]) -> ContextSource {
    let src = ContextSource::new();
    src.set_bucket(values.iter().map(|v| RawRecord::single(Field::string(*v))).collect());
    src
}

/// 一跳子管道：`[vertex]` → `[出边另一端的 vertex]`
pub fn out_hop(session: &SessionRef, context: &ContextSource) -> BoxedOperator {
    let decoder = AdjacencyListDecoder::new(
        session.clone(),
        context.boxed(),
        0,
        Direction::Outgoing,
        1,
    );
    let width = decoder.target_width();
    let traversal = TraversalOperator::new(
        session.clone(),
        Box::new(decoder),
        1,
        JsonQuery::new("n"),
    );
    Box::new(ProjectColumnsOperator::new(Box::new(traversal), vec![width]))
}
