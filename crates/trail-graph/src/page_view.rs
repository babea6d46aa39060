//! Page-view ingest and update
//!
//! Author: hephaex@gmail.com

use crate::domain::{normalize_domain, DomainResolver};
use crate::GraphStore;
use serde_json::Value;
use std::sync::Arc;
use trail_core::{
    Direction, EdgeLabel, IngestOutcome, PageViewAttributes, Result, TrailError, Vertex,
    VertexKind, TYPE_KEY,
};

/// Device that generated the page view (required)
pub const DEVICE_GUID_KEY: &str = "deviceGuid";
/// Page view this one follows
pub const PREDECESSOR_KEY: &str = "predecessor";
/// Page view this one was opened from
pub const PARENT_KEY: &str = "parent";
/// URL whose host becomes the page view's domain
pub const PAGE_URL_KEY: &str = "pageUrl";

/// Acknowledgement returned by [`PageViewService::update`]
pub const UPDATED_MESSAGE: &str = "vertex updated";

/// Writes page views into the graph
pub struct PageViewService {
    store: Arc<dyn GraphStore>,
    domains: DomainResolver,
}

impl PageViewService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            domains: DomainResolver::new(store.clone()),
            store,
        }
    }

    pub fn domains(&self) -> &DomainResolver {
        &self.domains
    }

    /// Create a page view from request attributes and link it into the graph.
    ///
    /// Every check runs before the vertex is written, so a rejected request
    /// leaves the graph untouched. Missing predecessor/parent targets are
    /// reported in the outcome instead of failing the request.
    pub async fn ingest(&self, attributes: &Value) -> Result<IngestOutcome> {
        let device_guid = match attributes.get(DEVICE_GUID_KEY) {
            None | Some(Value::Null) => {
                return Err(TrailError::InvalidInput("Missing deviceGuid".to_string()))
            }
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                return Err(TrailError::InvalidInput(
                    "deviceGuid must be a string or number".to_string(),
                ))
            }
        };

        let device = self
            .store
            .get_vertex(&device_guid)
            .await?
            .filter(|vertex| vertex.kind() == VertexKind::Device)
            .ok_or_else(|| {
                TrailError::InvalidReference(format!(
                    "Invalid deviceGuid {device_guid}, please recreate"
                ))
            })?;

        let attrs = PageViewAttributes::from_attributes(attributes)?;
        reject_type_override(&attrs)?;
        let predecessor = attrs.reference(PREDECESSOR_KEY)?;
        let parent = attrs.reference(PARENT_KEY)?;
        let page_url = match attrs.get(PAGE_URL_KEY) {
            None => None,
            Some(Value::String(url)) => Some(url.clone()),
            Some(_) => {
                return Err(TrailError::InvalidInput("pageUrl must be a string".to_string()))
            }
        };

        let mut properties = VertexKind::PageView.initial_properties();
        attrs.merge_into(&mut properties);
        let page_view = self.store.add_vertex(properties).await?;
        tracing::info!(id = %page_view.id, device = %device.id, "Page view created");

        let mut outcome = IngestOutcome::new(page_view.id.clone());

        if let Some(target) = predecessor {
            let linked = self.link(&page_view, &target, EdgeLabel::SuccessorTo).await?;
            outcome.predecessor = Some(status_note(PREDECESSOR_KEY, linked));
        }
        if let Some(target) = parent {
            let linked = self.link(&page_view, &target, EdgeLabel::ChildOf).await?;
            outcome.parent = Some(status_note(PARENT_KEY, linked));
        }

        self.store
            .add_edge(EdgeLabel::Viewed, &device.id, &page_view.id)
            .await?;

        if let Some(url) = page_url {
            let domain = self.domains.resolve(&normalize_domain(&url)).await?;
            self.store
                .add_edge(EdgeLabel::Under, &page_view.id, &domain.id)
                .await?;
            tracing::debug!(id = %page_view.id, domain = ?domain.domain(), "Page view linked to domain");
        }

        Ok(outcome)
    }

    /// Merge attributes onto an existing page view. Edges are not touched.
    pub async fn update(&self, id: &str, attributes: &Value) -> Result<&'static str> {
        let vertex = self.page_view(id).await?;

        let attrs = PageViewAttributes::from_attributes(attributes)?;
        reject_type_override(&attrs)?;
        if attrs.is_empty() {
            return Ok(UPDATED_MESSAGE);
        }

        self.store
            .merge_properties(&vertex.id, attrs.into_properties())
            .await?;
        tracing::info!(id, "Page view updated");
        Ok(UPDATED_MESSAGE)
    }

    /// Fetch one page view flattened the same way search results are
    pub async fn get(&self, id: &str) -> Result<Value> {
        let vertex = self.page_view(id).await?;
        let mut flat = PageViewAttributes::from_vertex(&vertex);

        if let Some(parent) = self.first_neighbor(&vertex.id, EdgeLabel::ChildOf).await? {
            flat.set_property("parentId", parent.id);
        }
        if let Some(previous) = self.first_neighbor(&vertex.id, EdgeLabel::SuccessorTo).await? {
            flat.set_property("predecessorId", previous.id);
        }
        Ok(flat.to_serializable())
    }

    async fn page_view(&self, id: &str) -> Result<Vertex> {
        let vertex = self
            .store
            .get_vertex(id)
            .await?
            .ok_or_else(|| TrailError::NotFound(format!("Invalid vertex {id}, can not update")))?;

        if vertex.kind() != VertexKind::PageView {
            return Err(TrailError::InvalidReference(format!(
                "vertex {id} is a {}, not a page view",
                vertex.kind()
            )));
        }
        Ok(vertex)
    }

    async fn first_neighbor(&self, id: &str, label: EdgeLabel) -> Result<Option<Vertex>> {
        Ok(self
            .store
            .neighbors(id, Direction::Out, label)
            .await?
            .into_iter()
            .next())
    }

    /// Link `from` to the page view `target` with `label` and its reverse.
    /// Returns false when the target is not a page view.
    async fn link(&self, from: &Vertex, target: &str, label: EdgeLabel) -> Result<bool> {
        let Some(target) = self.store.get_vertex(target).await? else {
            tracing::warn!(id = %from.id, target_id = target, %label, "Link target does not exist");
            return Ok(false);
        };
        if target.kind() != VertexKind::PageView {
            tracing::warn!(id = %from.id, target_id = %target.id, %label, "Link target is not a page view");
            return Ok(false);
        }

        self.store.add_edge(label, &from.id, &target.id).await?;
        if let Some(reverse) = label.reverse() {
            self.store.add_edge(reverse, &target.id, &from.id).await?;
        }
        tracing::debug!(id = %from.id, target_id = %target.id, %label, "Linked page views");
        Ok(true)
    }
}

fn reject_type_override(attrs: &PageViewAttributes) -> Result<()> {
    if attrs.get(TYPE_KEY).is_some() {
        return Err(TrailError::InvalidInput(format!(
            "'{TYPE_KEY}' is reserved and cannot be set on a page view"
        )));
    }
    Ok(())
}

fn status_note(relation: &str, linked: bool) -> String {
    if linked {
        format!("{relation} created successfully")
    } else {
        format!("{relation} could not be created")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGraphStore;
    use serde_json::json;
    use trail_core::Properties;

    async fn setup() -> (Arc<MemoryGraphStore>, PageViewService) {
        let store = Arc::new(MemoryGraphStore::new());
        store
            .insert_vertex("device-1", VertexKind::Device.initial_properties())
            .await
            .unwrap();
        let service = PageViewService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_missing_device_guid_is_invalid_input() {
        let (store, service) = setup().await;
        let err = service
            .ingest(&json!({ "pageOpenTime": 1 }))
            .await
            .unwrap_err();

        assert!(matches!(err, TrailError::InvalidInput(_)));
        assert_eq!(store.vertex_count().await, 1);
    }

    #[tokio::test]
    async fn test_non_device_guid_is_invalid_reference() {
        let (store, service) = setup().await;
        let user = store
            .add_vertex(VertexKind::User.initial_properties())
            .await
            .unwrap();

        for guid in [user.id.as_str(), "no-such-device"] {
            let err = service
                .ingest(&json!({ "deviceGuid": guid, "pageOpenTime": 1 }))
                .await
                .unwrap_err();
            assert!(matches!(err, TrailError::InvalidReference(_)));
        }
        assert_eq!(store.vertex_count().await, 2);
    }

    #[tokio::test]
    async fn test_plain_ingest_creates_vertex_and_viewed_edge() {
        let (store, service) = setup().await;
        let outcome = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageOpenTime": 1000, "title": "Home" }))
            .await
            .unwrap();

        assert_eq!(outcome, IngestOutcome::new(outcome.id.clone()));
        assert_eq!(store.vertex_count().await, 2);
        assert_eq!(store.edge_count().await, 1);

        let viewed = store
            .neighbors("device-1", Direction::Out, EdgeLabel::Viewed)
            .await
            .unwrap();
        assert_eq!(viewed.len(), 1);
        assert_eq!(viewed[0].id, outcome.id);
        assert_eq!(viewed[0].property("title"), Some(&json!("Home")));
        assert_eq!(viewed[0].property(DEVICE_GUID_KEY), Some(&json!("device-1")));
        assert_eq!(viewed[0].kind(), VertexKind::PageView);
    }

    #[tokio::test]
    async fn test_malformed_attributes_create_nothing() {
        let (store, service) = setup().await;
        let err = service
            .ingest(&json!({ "deviceGuid": "device-1", "tabs": [1, 2] }))
            .await
            .unwrap_err();

        assert!(matches!(err, TrailError::MalformedAttributes(_)));
        assert_eq!(store.vertex_count().await, 1);
    }

    #[tokio::test]
    async fn test_predecessor_and_parent_links() {
        let (store, service) = setup().await;
        let first = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageOpenTime": 1 }))
            .await
            .unwrap();

        let second = service
            .ingest(&json!({
                "deviceGuid": "device-1",
                "pageOpenTime": 2,
                "predecessor": first.id,
                "parent": "missing-parent"
            }))
            .await
            .unwrap();

        assert_eq!(
            second.predecessor.as_deref(),
            Some("predecessor created successfully")
        );
        assert_eq!(second.parent.as_deref(), Some("parent could not be created"));

        let earlier = store
            .neighbors(&second.id, Direction::Out, EdgeLabel::SuccessorTo)
            .await
            .unwrap();
        let later = store
            .neighbors(&first.id, Direction::Out, EdgeLabel::PredecessorTo)
            .await
            .unwrap();
        assert_eq!(earlier[0].id, first.id);
        assert_eq!(later[0].id, second.id);
        assert_eq!(store.edge_count_for(EdgeLabel::ChildOf).await, 0);
    }

    #[tokio::test]
    async fn test_parent_link_creates_reverse_edge() {
        let (store, service) = setup().await;
        let parent = service
            .ingest(&json!({ "deviceGuid": "device-1" }))
            .await
            .unwrap();
        let child = service
            .ingest(&json!({ "deviceGuid": "device-1", "parent": parent.id }))
            .await
            .unwrap();

        assert_eq!(child.parent.as_deref(), Some("parent created successfully"));
        let children = store
            .neighbors(&parent.id, Direction::Out, EdgeLabel::ParentOf)
            .await
            .unwrap();
        assert_eq!(children[0].id, child.id);
    }

    #[tokio::test]
    async fn test_link_to_device_is_refused() {
        let (_store, service) = setup().await;
        let outcome = service
            .ingest(&json!({ "deviceGuid": "device-1", "predecessor": "device-1" }))
            .await
            .unwrap();
        assert_eq!(
            outcome.predecessor.as_deref(),
            Some("predecessor could not be created")
        );
    }

    #[tokio::test]
    async fn test_same_host_shares_domain_vertex() {
        let (store, service) = setup().await;
        let a = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageUrl": "http://www.example.com/a" }))
            .await
            .unwrap();
        let b = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageUrl": "https://example.com/b" }))
            .await
            .unwrap();

        let domains = store
            .vertices_by_property("domain", &json!("example.com"))
            .await
            .unwrap();
        assert_eq!(domains.len(), 1);

        for id in [&a.id, &b.id] {
            let under = store.neighbors(id, Direction::Out, EdgeLabel::Under).await.unwrap();
            assert_eq!(under[0].id, domains[0].id);
        }
    }

    #[tokio::test]
    async fn test_unparseable_url_goes_under_special() {
        let (store, service) = setup().await;
        let outcome = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageUrl": "chrome newtab" }))
            .await
            .unwrap();

        let under = store
            .neighbors(&outcome.id, Direction::Out, EdgeLabel::Under)
            .await
            .unwrap();
        assert_eq!(under[0].domain(), Some("special"));
    }

    #[tokio::test]
    async fn test_non_string_page_url_is_invalid_input() {
        let (store, service) = setup().await;
        let err = service
            .ingest(&json!({ "deviceGuid": "device-1", "pageUrl": 7 }))
            .await
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
        assert_eq!(store.vertex_count().await, 1);
    }

    #[tokio::test]
    async fn test_type_cannot_be_overridden() {
        let (_store, service) = setup().await;
        let err = service
            .ingest(&json!({ "deviceGuid": "device-1", "type": "device" }))
            .await
            .unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_merges_properties() {
        let (store, service) = setup().await;
        let outcome = service
            .ingest(&json!({ "deviceGuid": "device-1", "title": "old", "pageOpenTime": 5 }))
            .await
            .unwrap();

        let message = service
            .update(&outcome.id, &json!({ "title": "new", "pageCloseTime": 9 }))
            .await
            .unwrap();
        assert_eq!(message, UPDATED_MESSAGE);

        let vertex = store.get_vertex(&outcome.id).await.unwrap().unwrap();
        assert_eq!(vertex.property("title"), Some(&json!("new")));
        assert_eq!(vertex.property("pageCloseTime"), Some(&json!(9)));
        assert_eq!(vertex.page_open_time(), Some(5));
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_vertex_is_not_found() {
        let (store, service) = setup().await;
        let err = service
            .update("nope", &json!({ "title": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, TrailError::NotFound(_)));
        assert_eq!(store.vertex_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_payload() {
        let (_store, service) = setup().await;
        let outcome = service
            .ingest(&json!({ "deviceGuid": "device-1" }))
            .await
            .unwrap();
        let err = service
            .update(&outcome.id, &json!("title"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrailError::MalformedAttributes(_)));
    }

    #[tokio::test]
    async fn test_get_reports_links() {
        let (store, service) = setup().await;
        let parent = service.ingest(&json!({ "deviceGuid": "device-1" })).await.unwrap();
        let child = service
            .ingest(&json!({ "deviceGuid": "device-1", "parent": parent.id, "title": "c" }))
            .await
            .unwrap();

        let flat = service.get(&child.id).await.unwrap();
        assert_eq!(flat["id"], json!(child.id));
        assert_eq!(flat["parentId"], json!(parent.id));
        assert_eq!(flat["title"], json!("c"));

        store
            .insert_vertex("dom", {
                let mut p = Properties::new();
                p.insert(TYPE_KEY.to_string(), json!("domain"));
                p
            })
            .await
            .unwrap();
        assert!(matches!(
            service.get("dom").await,
            Err(TrailError::InvalidReference(_))
        ));
    }
}
