//! 会话级顶点缓存
//!
//! 顶点 ID → 共享顶点对象，文档 ID → etag。
//! 只在写入成功之后更新，会话结束时整体丢弃。

use super::vertex::VertexRef;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct VertexCache {
    vertices: HashMap<String, VertexRef>,
    etags: HashMap<String, String>,
}

impl VertexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<VertexRef> {
        self.vertices.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    /// 插入顶点；已存在时返回已缓存的对象，不覆盖
    pub fn insert_if_absent(&mut self, vertex: VertexRef) -> VertexRef {
        let id = vertex.borrow().id().to_string();
        self.vertices.entry(id).or_insert(vertex).clone()
    }

    pub fn remove(&mut self, id: &str) -> Option<VertexRef> {
        self.etags.remove(id);
        self.vertices.remove(id)
    }

    pub fn etag(&self, doc_id: &str) -> Option<&str> {
        self.etags.get(doc_id).map(|s| s.as_str())
    }

    pub fn set_etag(&mut self, doc_id: impl Into<String>, etag: Option<String>) {
        let doc_id = doc_id.into();
        match etag {
            Some(etag) => {
                self.etags.insert(doc_id, etag);
            }
            None => {
                self.etags.remove(&doc_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.etags.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexField;
    use std::rc::Rc;

    #[test]
    fn test_insert_if_absent_keeps_first_object() {
        let mut cache = VertexCache::new();
        let first = VertexField::new("a", "person").into_ref();
        let second = VertexField::new("a", "software").into_ref();

        let kept = cache.insert_if_absent(first.clone());
        assert!(Rc::ptr_eq(&kept, &first));
        let kept = cache.insert_if_absent(second);
        assert!(Rc::ptr_eq(&kept, &first));
        assert_eq!(cache.get("a").unwrap().borrow().label(), "person");
    }

    #[test]
    fn test_remove_drops_etag() {
        let mut cache = VertexCache::new();
        cache.insert_if_absent(VertexField::new("a", "person").into_ref());
        cache.set_etag("a", Some("1".to_string()));
        assert_eq!(cache.etag("a"), Some("1"));

        cache.remove("a");
        assert!(cache.etag("a").is_none());
        assert!(cache.is_empty());
    }
}
