//! In-memory graph store
//!
//! Keeps vertices, per-label adjacency lists in both directions, and an
//! index from `domain` values to vertex IDs. Other property lookups scan.
//! Used by default and in tests; contents are lost on restart.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use trail_core::{Direction, EdgeLabel, Properties, Result, TrailError, Vertex, DOMAIN_KEY};

type AdjacencyKey = (String, EdgeLabel);
type IndexKey = (String, String);

/// Property keys kept in the value index
const INDEXED_KEYS: &[&str] = &[DOMAIN_KEY];

#[derive(Default)]
struct GraphData {
    vertices: HashMap<String, Properties>,
    /// Creation order, for stable lookup results
    sequence: HashMap<String, u64>,
    outgoing: HashMap<AdjacencyKey, Vec<String>>,
    incoming: HashMap<AdjacencyKey, Vec<String>>,
    index: HashMap<IndexKey, Vec<String>>,
    next_id: u64,
    next_sequence: u64,
    edge_count: usize,
}

impl GraphData {
    fn by_sequence(&self, mut ids: Vec<String>) -> Vec<Vertex> {
        ids.sort_by_key(|id| self.sequence.get(id).copied().unwrap_or(u64::MAX));
        ids.iter().filter_map(|id| self.vertex(id)).collect()
    }

    fn vertex(&self, id: &str) -> Option<Vertex> {
        self.vertices
            .get(id)
            .map(|properties| Vertex::new(id, properties.clone()))
    }

    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = self.next_id.to_string();
            if !self.vertices.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert(&mut self, id: String, properties: Properties) -> Vertex {
        for (key, value) in &properties {
            if let Some(index_key) = index_key(key, value) {
                self.index.entry(index_key).or_default().push(id.clone());
            }
        }
        self.sequence.insert(id.clone(), self.next_sequence);
        self.next_sequence += 1;
        self.vertices.insert(id.clone(), properties.clone());
        Vertex::new(id, properties)
    }

    fn unindex(&mut self, id: &str, key: &str, value: &Value) {
        if let Some(index_key) = index_key(key, value) {
            if let Some(ids) = self.index.get_mut(&index_key) {
                ids.retain(|existing| existing != id);
                if ids.is_empty() {
                    self.index.remove(&index_key);
                }
            }
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_) | Value::Null)
}

fn index_key(key: &str, value: &Value) -> Option<IndexKey> {
    if INDEXED_KEYS.contains(&key) && is_scalar(value) {
        Some((key.to_string(), value.to_string()))
    } else {
        None
    }
}

/// Process-local graph store
#[derive(Default)]
pub struct MemoryGraphStore {
    data: RwLock<GraphData>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vertices
    pub async fn vertex_count(&self) -> usize {
        self.data.read().await.vertices.len()
    }

    /// Number of stored edges across all labels
    pub async fn edge_count(&self) -> usize {
        self.data.read().await.edge_count
    }

    /// Number of stored edges with `label`
    pub async fn edge_count_for(&self, label: EdgeLabel) -> usize {
        self.data
            .read()
            .await
            .outgoing
            .iter()
            .filter(|((_, l), _)| *l == label)
            .map(|(_, targets)| targets.len())
            .sum()
    }
}

#[async_trait]
impl super::GraphStore for MemoryGraphStore {
    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        Ok(self.data.read().await.vertex(id))
    }

    async fn add_vertex(&self, properties: Properties) -> Result<Vertex> {
        let mut data = self.data.write().await;
        let id = data.fresh_id();
        Ok(data.insert(id, properties))
    }

    async fn insert_vertex(&self, id: &str, properties: Properties) -> Result<Vertex> {
        if id.is_empty() {
            return Err(TrailError::InvalidInput("vertex id cannot be empty".to_string()));
        }
        let mut data = self.data.write().await;
        if data.vertices.contains_key(id) {
            return Err(TrailError::InvalidInput(format!("vertex {id} already exists")));
        }
        Ok(data.insert(id.to_string(), properties))
    }

    async fn merge_properties(&self, id: &str, properties: Properties) -> Result<Vertex> {
        let mut data = self.data.write().await;
        let mut current = data
            .vertices
            .remove(id)
            .ok_or_else(|| TrailError::NotFound(format!("vertex {id}")))?;

        for (key, value) in properties {
            if let Some(old) = current.get(&key).cloned() {
                data.unindex(id, &key, &old);
            }
            if let Some(index_key) = index_key(&key, &value) {
                data.index.entry(index_key).or_default().push(id.to_string());
            }
            current.insert(key, value);
        }

        data.vertices.insert(id.to_string(), current.clone());
        Ok(Vertex::new(id, current))
    }

    async fn add_edge(&self, label: EdgeLabel, from: &str, to: &str) -> Result<()> {
        let mut data = self.data.write().await;
        for end in [from, to] {
            if !data.vertices.contains_key(end) {
                return Err(TrailError::NotFound(format!("vertex {end}")));
            }
        }

        data.outgoing
            .entry((from.to_string(), label))
            .or_default()
            .push(to.to_string());
        data.incoming
            .entry((to.to_string(), label))
            .or_default()
            .push(from.to_string());
        data.edge_count += 1;
        Ok(())
    }

    async fn vertices_by_property(&self, key: &str, value: &Value) -> Result<Vec<Vertex>> {
        if !is_scalar(value) {
            return Ok(Vec::new());
        }

        let data = self.data.read().await;
        let ids = match index_key(key, value) {
            Some(index_key) => data.index.get(&index_key).cloned().unwrap_or_default(),
            None => data
                .vertices
                .iter()
                .filter(|(_, properties)| properties.get(key) == Some(value))
                .map(|(id, _)| id.clone())
                .collect(),
        };
        Ok(data.by_sequence(ids))
    }

    async fn neighbors(&self, id: &str, direction: Direction, label: EdgeLabel) -> Result<Vec<Vertex>> {
        let data = self.data.read().await;
        let adjacency = match direction {
            Direction::Out => &data.outgoing,
            Direction::In => &data.incoming,
        };

        Ok(adjacency
            .get(&(id.to_string(), label))
            .map(|ids| ids.iter().filter_map(|other| data.vertex(other)).collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
