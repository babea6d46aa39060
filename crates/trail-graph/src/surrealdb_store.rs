//! SurrealDB implementation for graph storage
//!
//! Vertices live in the `vertex` table with their properties in a single
//! object field. Edges are `edge` relations carrying a `label`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::sql::{Id, Thing};
use surrealdb::Surreal;
use trail_core::{DatabaseConfig, Direction, EdgeLabel, Properties, Result, TrailError, Vertex};
use uuid::Uuid;

const VERTEX_TABLE: &str = "vertex";

/// SurrealDB graph store implementation
pub struct SurrealDbStore {
    client: Surreal<Client>,
}

impl SurrealDbStore {
    /// Create a new SurrealDB connection
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // Remove ws:// or wss:// prefix if present (surrealdb crate adds it automatically)
        let url = config
            .surrealdb_url
            .strip_prefix("ws://")
            .or_else(|| config.surrealdb_url.strip_prefix("wss://"))
            .unwrap_or(&config.surrealdb_url);

        let client = Surreal::new::<Ws>(url)
            .await
            .map_err(|e| TrailError::DatabaseError(format!("SurrealDB connection failed: {e}")))?;

        // Authenticate
        client
            .signin(Root {
                username: &config.surrealdb_user,
                password: &config.surrealdb_pass,
            })
            .await
            .map_err(|e| TrailError::DatabaseError(format!("SurrealDB auth failed: {e}")))?;

        // Select namespace and database
        client
            .use_ns(&config.surrealdb_namespace)
            .use_db(&config.surrealdb_database)
            .await
            .map_err(|e| TrailError::DatabaseError(format!("SurrealDB namespace error: {e}")))?;

        Ok(Self { client })
    }

    /// Initialize schema (safe to run on every start)
    pub async fn init_schema(&self) -> Result<()> {
        self.client
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS vertex SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_vertex_domain ON vertex FIELDS properties.domain;
                DEFINE TABLE IF NOT EXISTS edge SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_edge_in ON edge FIELDS in, label;
                DEFINE INDEX IF NOT EXISTS idx_edge_out ON edge FIELDS out, label;
            "#,
            )
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Schema init failed: {e}")))?
            .check()
            .map_err(|e| TrailError::DatabaseError(format!("Schema init failed: {e}")))?;

        Ok(())
    }

    async fn create(&self, id: String, properties: Properties) -> Result<Vertex> {
        let created: Vec<VertexRecord> = self
            .client
            .query(
                "CREATE type::thing('vertex', $id) \
                 SET properties = $properties, created_at = time::now()",
            )
            .bind(("id", id.clone()))
            .bind(("properties", serde_json::Value::Object(properties)))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Failed to create vertex: {e}")))?
            .take(0)
            .map_err(|e| TrailError::DatabaseError(format!("Failed to create vertex: {e}")))?;

        created
            .into_iter()
            .next()
            .map(|r| r.into_vertex(Some(id.as_str())))
            .ok_or_else(|| TrailError::DatabaseError(format!("vertex {id} was not created")))
    }
}

/// Vertex record for SurrealDB
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VertexRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    #[serde(default)]
    properties: serde_json::Value,
}

impl VertexRecord {
    fn into_vertex(self, fallback_id: Option<&str>) -> Vertex {
        let id = self
            .id
            .map(|thing| thing_id(&thing))
            .or_else(|| fallback_id.map(str::to_string))
            .unwrap_or_default();

        let properties = match self.properties {
            serde_json::Value::Object(map) => map,
            _ => Properties::new(),
        };

        Vertex::new(id, properties)
    }
}

/// Far end of an edge, fetched through the edge record
#[derive(Debug, Deserialize)]
struct EdgeTarget {
    target: VertexRecord,
}

/// Walk the edge table from one endpoint using its `in`/`out` index, in
/// edge insertion order
fn neighbors_query(direction: Direction) -> String {
    let (near, far) = match direction {
        Direction::Out => ("in", "out"),
        Direction::In => ("out", "in"),
    };
    format!(
        "SELECT created_at, {far}.* AS target FROM edge \
         WHERE {near} = type::thing('vertex', $id) AND label = $label \
         ORDER BY created_at"
    )
}

fn thing_id(thing: &Thing) -> String {
    match &thing.id {
        Id::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Property keys are spliced into queries, so only plain identifiers pass
fn checked_property_key(key: &str) -> Result<&str> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(key)
    } else {
        Err(TrailError::InvalidInput(format!("unsupported property key: {key}")))
    }
}

#[async_trait]
impl super::GraphStore for SurrealDbStore {
    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>> {
        let record: Option<VertexRecord> = self
            .client
            .select((VERTEX_TABLE, id.to_string()))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Failed to get vertex: {e}")))?;

        Ok(record.map(|r| r.into_vertex(Some(id))))
    }

    async fn add_vertex(&self, properties: Properties) -> Result<Vertex> {
        self.create(Uuid::new_v4().to_string(), properties).await
    }

    async fn insert_vertex(&self, id: &str, properties: Properties) -> Result<Vertex> {
        if id.is_empty() {
            return Err(TrailError::InvalidInput("vertex id cannot be empty".to_string()));
        }
        if self.get_vertex(id).await?.is_some() {
            return Err(TrailError::InvalidInput(format!("vertex {id} already exists")));
        }
        self.create(id.to_string(), properties).await
    }

    async fn merge_properties(&self, id: &str, properties: Properties) -> Result<Vertex> {
        if self.get_vertex(id).await?.is_none() {
            return Err(TrailError::NotFound(format!("vertex {id}")));
        }

        let updated: Option<VertexRecord> = self
            .client
            .update((VERTEX_TABLE, id.to_string()))
            .merge(serde_json::json!({ "properties": properties }))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Failed to update vertex: {e}")))?;

        updated
            .map(|r| r.into_vertex(Some(id)))
            .ok_or_else(|| TrailError::NotFound(format!("vertex {id}")))
    }

    async fn add_edge(&self, label: EdgeLabel, from: &str, to: &str) -> Result<()> {
        for end in [from, to] {
            if self.get_vertex(end).await?.is_none() {
                return Err(TrailError::NotFound(format!("vertex {end}")));
            }
        }

        self.client
            .query(
                r#"
                LET $a = type::thing('vertex', $from);
                LET $b = type::thing('vertex', $to);
                RELATE $a->edge->$b SET label = $label, created_at = time::now();
            "#,
            )
            .bind(("from", from.to_string()))
            .bind(("to", to.to_string()))
            .bind(("label", label.as_str()))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Failed to store edge: {e}")))?
            .check()
            .map_err(|e| TrailError::DatabaseError(format!("Failed to store edge: {e}")))?;

        Ok(())
    }

    async fn vertices_by_property(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Vertex>> {
        let key = checked_property_key(key)?;
        let query =
            format!("SELECT * FROM vertex WHERE properties.{key} = $value ORDER BY created_at");

        let records: Vec<VertexRecord> = self
            .client
            .query(query)
            .bind(("value", value.clone()))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Query failed: {e}")))?
            .take(0)
            .map_err(|e| TrailError::DatabaseError(format!("Result extraction failed: {e}")))?;

        Ok(records.into_iter().map(|r| r.into_vertex(None)).collect())
    }

    async fn neighbors(&self, id: &str, direction: Direction, label: EdgeLabel) -> Result<Vec<Vertex>> {
        let records: Vec<EdgeTarget> = self
            .client
            .query(neighbors_query(direction))
            .bind(("id", id.to_string()))
            .bind(("label", label.as_str()))
            .await
            .map_err(|e| TrailError::DatabaseError(format!("Traverse failed: {e}")))?
            .take(0)
            .map_err(|e| TrailError::DatabaseError(format!("Result extraction failed: {e}")))?;

        Ok(records
            .into_iter()
            .map(|r| r.target.into_vertex(None))
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .health()
            .await
            .map_err(|e| TrailError::DatabaseError(format!("SurrealDB health check failed: {e}")))
    }

    fn name(&self) -> &str {
        "surrealdb"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphStore;
    use serde_json::json;
    use trail_core::VertexKind;

    #[test]
    fn test_property_keys_are_identifiers() {
        assert!(checked_property_key("domain").is_ok());
        assert!(checked_property_key("page_open_time").is_ok());
        assert!(checked_property_key("").is_err());
        assert!(checked_property_key("domain; DELETE vertex").is_err());
    }

    #[test]
    fn test_record_conversion_prefers_thing_id() {
        let record = VertexRecord {
            id: Some(Thing::from(("vertex", "abc-123"))),
            properties: json!({ "type": "device" }),
        };
        let vertex = record.into_vertex(Some("ignored"));
        assert_eq!(vertex.id, "abc-123");
        assert_eq!(vertex.kind(), VertexKind::Device);

        let bare = VertexRecord {
            id: None,
            properties: json!(null),
        };
        let vertex = bare.into_vertex(Some("fallback"));
        assert_eq!(vertex.id, "fallback");
        assert!(vertex.properties.is_empty());
    }

    #[test]
    fn test_neighbors_query_walks_edges_in_order() {
        let out = neighbors_query(Direction::Out);
        assert!(out.contains("out.* AS target FROM edge"));
        assert!(out.contains("WHERE in = type::thing('vertex', $id)"));
        assert!(out.ends_with("ORDER BY created_at"));
        assert!(!out.contains("FROM vertex"));

        let incoming = neighbors_query(Direction::In);
        assert!(incoming.contains("in.* AS target FROM edge"));
        assert!(incoming.contains("WHERE out = type::thing('vertex', $id)"));
    }

    #[test]
    fn test_edge_target_decodes_vertex() {
        let row: EdgeTarget = serde_json::from_value(json!({
            "created_at": "2024-01-01T00:00:00Z",
            "target": { "properties": { "type": "domain", "domain": "a.com" } }
        }))
        .unwrap();
        let vertex = row.target.into_vertex(Some("v1"));
        assert_eq!(vertex.id, "v1");
        assert_eq!(vertex.kind(), VertexKind::Domain);
    }

    #[tokio::test]
    #[ignore = "requires a running SurrealDB"]
    async fn test_round_trip_against_surrealdb() {
        let store = SurrealDbStore::new(&DatabaseConfig::default()).await.unwrap();
        store.init_schema().await.unwrap();

        let device = store
            .add_vertex(VertexKind::Device.initial_properties())
            .await
            .unwrap();
        let page = store
            .add_vertex(json!({ "pageOpenTime": 1 }).as_object().cloned().unwrap())
            .await
            .unwrap();
        store
            .add_edge(EdgeLabel::Viewed, &device.id, &page.id)
            .await
            .unwrap();

        let later = store
            .add_vertex(json!({ "pageOpenTime": 2 }).as_object().cloned().unwrap())
            .await
            .unwrap();
        store
            .add_edge(EdgeLabel::Viewed, &device.id, &later.id)
            .await
            .unwrap();

        let viewed = store
            .neighbors(&device.id, Direction::Out, EdgeLabel::Viewed)
            .await
            .unwrap();
        let ids: Vec<_> = viewed.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec![page.id.as_str(), later.id.as_str()]);

        let viewers = store
            .neighbors(&later.id, Direction::In, EdgeLabel::Viewed)
            .await
            .unwrap();
        assert_eq!(viewers[0].id, device.id);
    }
}
