//! Domain vertices
//!
//! Page views are grouped under one vertex per normalized host. Lookups go
//! through the store's property index; creation of a missing domain is
//! serialized per host so concurrent ingests cannot create duplicates.

use crate::GraphStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use trail_core::{Properties, Result, Vertex, VertexKind, DOMAIN_KEY};

/// Domain recorded for page URLs without a usable host
pub const SPECIAL_DOMAIN: &str = "special";

/// Normalize a host name: trim, lower-case, drop one leading `www.`
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Domain of a page URL, or [`SPECIAL_DOMAIN`] when the URL has no host
pub fn normalize_domain(page_url: &str) -> String {
    url::Url::parse(page_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(normalize_host))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| SPECIAL_DOMAIN.to_string())
}

/// Finds or creates domain vertices
pub struct DomainResolver {
    store: Arc<dyn GraphStore>,
    creating: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DomainResolver {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            creating: Mutex::new(HashMap::new()),
        }
    }

    /// Return the vertex for `domain`, creating it on first reference.
    ///
    /// If duplicates already exist the oldest one wins.
    pub async fn resolve(&self, domain: &str) -> Result<Vertex> {
        if let Some(existing) = self.find(domain).await? {
            return Ok(existing);
        }

        let slot = self.creation_slot(domain);
        let _guard = slot.lock.lock().await;

        // Another resolver may have created it while we waited
        if let Some(existing) = self.find(domain).await? {
            return Ok(existing);
        }

        let mut properties: Properties = VertexKind::Domain.initial_properties();
        properties.insert(DOMAIN_KEY.to_string(), domain.into());
        let created = self.store.add_vertex(properties).await?;

        tracing::info!(domain, id = %created.id, "Created domain vertex");
        Ok(created)
    }

    async fn find(&self, domain: &str) -> Result<Option<Vertex>> {
        let matches = self
            .store
            .vertices_by_property(DOMAIN_KEY, &serde_json::Value::from(domain))
            .await?;

        if matches.len() > 1 {
            tracing::warn!(domain, count = matches.len(), "Duplicate domain vertices");
        }

        Ok(matches
            .into_iter()
            .find(|vertex| vertex.kind() == VertexKind::Domain))
    }

    fn creation_slot<'a>(&'a self, domain: &'a str) -> CreationSlot<'a> {
        let mut creating = self.creating.lock().unwrap_or_else(|e| e.into_inner());
        let lock = creating.entry(domain.to_string()).or_default().clone();
        CreationSlot {
            creating: &self.creating,
            domain,
            lock,
        }
    }
}

/// A claim on one domain's creation lock.
///
/// Dropping the last claim removes the map entry, also when a waiter is
/// cancelled before it gets the lock.
struct CreationSlot<'a> {
    creating: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    domain: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for CreationSlot<'_> {
    fn drop(&mut self) {
        let mut creating = self.creating.lock().unwrap_or_else(|e| e.into_inner());
        // Claims are only cloned under the map lock
        let last = creating
            .get(self.domain)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(&self.lock) == 2);
        if last {
            creating.remove(self.domain);
        }
    }
}
