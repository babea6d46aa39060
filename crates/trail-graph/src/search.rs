//! Browsing History Search
//!
//! Finds the page views a user's devices opened around a point in time,
//! optionally restricted to one domain, and expands every match along its
//! successor and/or child chains.
//!
//! Author: hephaex@gmail.com

use crate::domain::normalize_host;
use crate::GraphStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use trail_core::{
    Direction, EdgeLabel, PageViewAttributes, Result, SearchConfig, SearchQuery, TimeUnit,
    TrailError, Vertex,
};

// ============================================================================
// Search Service
// ============================================================================

/// Inclusive window of page open times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// `[open_time - range, open_time + range]`.
    ///
    /// `range` is in seconds while `open_time` is in milliseconds; existing
    /// clients depend on this window width, so no rescaling happens here.
    pub fn around(open_time: i64, range: i64) -> Self {
        Self {
            start: open_time.saturating_sub(range),
            end: open_time.saturating_add(range),
        }
    }

    pub fn contains(&self, time: i64) -> bool {
        (self.start..=self.end).contains(&time)
    }
}

/// Searches a user's browsing history
pub struct SearchService {
    store: Arc<dyn GraphStore>,
    defaults: SearchConfig,
}

impl SearchService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            defaults: SearchConfig::default(),
        }
    }

    /// Set defaults for requests that omit the time range
    pub fn with_defaults(mut self, defaults: SearchConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Run a search and return flattened page views in discovery order
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let open_time = query.open_time.trim();
        if open_time.is_empty() {
            return Err(TrailError::InvalidInput(
                "You should specify an openTime".to_string(),
            ));
        }
        if query.user_guid.is_empty() {
            return Err(TrailError::InvalidInput(
                "You should specify a userGuid".to_string(),
            ));
        }
        let open_time: i64 = open_time.parse().map_err(|_| {
            TrailError::InvalidInput(format!("openTime must be epoch milliseconds: {open_time}"))
        })?;

        let user = self
            .store
            .get_vertex(&query.user_guid)
            .await?
            .ok_or_else(|| TrailError::NotFound("Invalid userGuid".to_string()))?;

        let window = self.window(query, open_time);
        let domain = query
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(normalize_host);

        let matches = self.matching_page_views(&user, window, domain.as_deref()).await?;
        tracing::debug!(
            user = %user.id,
            start = window.start,
            end = window.end,
            domain = ?domain,
            matches = matches.len(),
            "Search matched page views"
        );

        let results = self
            .expand(matches, query.include_successors, query.include_children)
            .await?;
        tracing::info!(user = %user.id, results = results.len(), "Search completed");
        Ok(results)
    }

    fn window(&self, query: &SearchQuery, open_time: i64) -> TimeWindow {
        let range = query.time_range.unwrap_or(self.defaults.default_time_range);
        let units = query
            .time_range_units
            .as_deref()
            .unwrap_or(&self.defaults.default_time_range_units);
        TimeWindow::around(open_time, TimeUnit::parse(units).to_seconds(range))
    }

    /// user -owns-> device -viewed-> page view, filtered by window and domain
    async fn matching_page_views(
        &self,
        user: &Vertex,
        window: TimeWindow,
        domain: Option<&str>,
    ) -> Result<Vec<Vertex>> {
        let mut matches = Vec::new();

        for device in self.out(&user.id, EdgeLabel::Owns).await? {
            for page_view in self.out(&device.id, EdgeLabel::Viewed).await? {
                let in_window = page_view
                    .page_open_time()
                    .is_some_and(|time| window.contains(time));
                if !in_window {
                    continue;
                }

                if let Some(domain) = domain {
                    let under = self.out(&page_view.id, EdgeLabel::Under).await?;
                    if !under.iter().any(|d| d.domain() == Some(domain)) {
                        continue;
                    }
                }

                matches.push(page_view);
            }
        }

        Ok(matches)
    }

    /// Depth-first expansion from every match. Each vertex is emitted once,
    /// so cycles in the successor or child chains terminate.
    async fn expand(
        &self,
        roots: Vec<Vertex>,
        successors: bool,
        children: bool,
    ) -> Result<Vec<Value>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut results = Vec::new();

        for root in roots {
            let mut stack = vec![root];

            while let Some(vertex) = stack.pop() {
                if !visited.insert(vertex.id.clone()) {
                    continue;
                }
                results.push(self.describe(&vertex).await?);

                let mut next = Vec::new();
                if successors {
                    next.extend(self.out(&vertex.id, EdgeLabel::PredecessorTo).await?);
                }
                if children {
                    next.extend(self.out(&vertex.id, EdgeLabel::ParentOf).await?);
                }
                // Reversed so the first neighbor is visited first
                stack.extend(next.into_iter().rev().filter(|v| !visited.contains(&v.id)));
            }
        }

        Ok(results)
    }

    /// Flatten a page view, adding `parentId`/`predecessorId` when linked
    async fn describe(&self, vertex: &Vertex) -> Result<Value> {
        let mut flat = PageViewAttributes::from_vertex(vertex);

        for parent in self.out(&vertex.id, EdgeLabel::ChildOf).await? {
            flat.set_property("parentId", parent.id);
        }
        for predecessor in self.out(&vertex.id, EdgeLabel::SuccessorTo).await? {
            flat.set_property("predecessorId", predecessor.id);
        }

        Ok(flat.to_serializable())
    }

    async fn out(&self, id: &str, label: EdgeLabel) -> Result<Vec<Vertex>> {
        self.store.neighbors(id, Direction::Out, label).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryGraphStore, PageViewService};
    use serde_json::json;
    use trail_core::VertexKind;

    struct Fixture {
        store: Arc<MemoryGraphStore>,
        ingest: PageViewService,
        search: SearchService,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryGraphStore::new());
            store
                .insert_vertex("user-1", VertexKind::User.initial_properties())
                .await
                .unwrap();
            store
                .insert_vertex("device-1", VertexKind::Device.initial_properties())
                .await
                .unwrap();
            store
                .add_edge(EdgeLabel::Owns, "user-1", "device-1")
                .await
                .unwrap();

            Self {
                ingest: PageViewService::new(store.clone()),
                search: SearchService::new(store.clone()),
                store,
            }
        }

        async fn view(&self, attributes: Value) -> String {
            let mut attributes = attributes;
            attributes["deviceGuid"] = json!("device-1");
            self.ingest.ingest(&attributes).await.unwrap().id
        }
    }

    fn ids(results: &[Value]) -> Vec<String> {
        results
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn open_times(results: &[Value]) -> Vec<i64> {
        let mut times: Vec<i64> = results
            .iter()
            .map(|r| r["pageOpenTime"].as_i64().unwrap())
            .collect();
        times.sort();
        times
    }

    #[test]
    fn test_time_window_bounds() {
        let window = TimeWindow::around(1000, 5);
        assert!(window.contains(995));
        assert!(window.contains(1005));
        assert!(!window.contains(994));
        assert!(!window.contains(1006));
    }

    #[tokio::test]
    async fn test_requires_open_time_and_user() {
        let f = Fixture::new().await;

        let err = f.search.search(&SearchQuery::new("user-1", "")).await.unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));

        let err = f.search.search(&SearchQuery::new("", "1000")).await.unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));

        let err = f.search.search(&SearchQuery::new("user-1", "noon")).await.unwrap_err();
        assert!(matches!(err, TrailError::InvalidInput(_)));

        let err = f.search.search(&SearchQuery::new("ghost", "1000")).await.unwrap_err();
        assert!(matches!(err, TrailError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_window_is_inclusive() {
        let f = Fixture::new().await;
        for time in [994, 995, 1000, 1005, 1006] {
            f.view(json!({ "pageOpenTime": time })).await;
        }

        let query = SearchQuery::new("user-1", "1000").with_range(5, "seconds");
        let results = f.search.search(&query).await.unwrap();

        assert_eq!(open_times(&results), vec![995, 1000, 1005]);
    }

    #[tokio::test]
    async fn test_units_convert_and_unknown_units_pass_through() {
        let f = Fixture::new().await;
        for time in [1000 - 120, 1000 + 61, 1000 + 7] {
            f.view(json!({ "pageOpenTime": time })).await;
        }

        let minutes = SearchQuery::new("user-1", "1000").with_range(1, "minutes");
        assert_eq!(
            open_times(&f.search.search(&minutes).await.unwrap()),
            vec![1007]
        );

        let hours = SearchQuery::new("user-1", "1000").with_range(1, "hours");
        assert_eq!(
            open_times(&f.search.search(&hours).await.unwrap()),
            vec![880, 1007, 1061]
        );

        let unknown = SearchQuery::new("user-1", "1000").with_range(7, "days");
        assert_eq!(
            open_times(&f.search.search(&unknown).await.unwrap()),
            vec![1007]
        );
    }

    #[tokio::test]
    async fn test_default_range_is_thirty_minutes() {
        let f = Fixture::new().await;
        f.view(json!({ "pageOpenTime": 1000 + 1800 })).await;
        f.view(json!({ "pageOpenTime": 1000 + 1801 })).await;

        let results = f.search.search(&SearchQuery::new("user-1", "1000")).await.unwrap();
        assert_eq!(open_times(&results), vec![2800]);
    }

    #[tokio::test]
    async fn test_domain_filter() {
        let f = Fixture::new().await;
        let a = f
            .view(json!({ "pageOpenTime": 1000, "pageUrl": "https://www.example.com/" }))
            .await;
        f.view(json!({ "pageOpenTime": 1000, "pageUrl": "https://other.org/" }))
            .await;
        f.view(json!({ "pageOpenTime": 1000 })).await;

        for filter in ["example.com", "www.example.com"] {
            let query = SearchQuery::new("user-1", "1000").with_domain(filter);
            assert_eq!(ids(&f.search.search(&query).await.unwrap()), vec![a.clone()]);
        }

        let none = SearchQuery::new("user-1", "1000").with_domain("example.net");
        assert!(f.search.search(&none).await.unwrap().is_empty());

        let blank = SearchQuery::new("user-1", "1000").with_domain("  ");
        assert_eq!(f.search.search(&blank).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_successor_chain_with_loop_emits_each_once() {
        let f = Fixture::new().await;
        let a = f.view(json!({ "pageOpenTime": 1000 })).await;
        let b = f
            .view(json!({ "pageOpenTime": 999_000, "predecessor": a }))
            .await;
        let c = f
            .view(json!({ "pageOpenTime": 999_500, "predecessor": b }))
            .await;
        // Close the loop: C -> A
        f.store
            .add_edge(EdgeLabel::PredecessorTo, &c, &a)
            .await
            .unwrap();

        let query = SearchQuery::new("user-1", "1000")
            .with_range(5, "seconds")
            .with_successors(true);
        let results = f.search.search(&query).await.unwrap();

        assert_eq!(ids(&results), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(results[1]["predecessorId"], json!(a));
        assert_eq!(results[2]["predecessorId"], json!(b));

        let without = SearchQuery::new("user-1", "1000").with_range(5, "seconds");
        assert_eq!(ids(&f.search.search(&without).await.unwrap()), vec![a]);
    }

    #[tokio::test]
    async fn test_child_chain_with_loop_emits_each_once() {
        let f = Fixture::new().await;
        let a = f.view(json!({ "pageOpenTime": 1000 })).await;
        let b = f
            .view(json!({ "pageOpenTime": 999_000, "parent": a }))
            .await;
        let c = f
            .view(json!({ "pageOpenTime": 999_500, "parent": b }))
            .await;
        // Close the loop: C parents A
        f.store.add_edge(EdgeLabel::ParentOf, &c, &a).await.unwrap();

        let query = SearchQuery::new("user-1", "1000")
            .with_range(5, "seconds")
            .with_children(true);
        let results = f.search.search(&query).await.unwrap();

        assert_eq!(ids(&results), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(results[1]["parentId"], json!(a));
        assert_eq!(results[2]["parentId"], json!(b));

        let both = query.with_successors(true);
        assert_eq!(ids(&f.search.search(&both).await.unwrap()), vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_children_and_successors_depth_first() {
        let f = Fixture::new().await;
        let root = f.view(json!({ "pageOpenTime": 1000 })).await;
        let child = f
            .view(json!({ "pageOpenTime": 50_000, "parent": root }))
            .await;
        let grandchild = f
            .view(json!({ "pageOpenTime": 60_000, "parent": child }))
            .await;
        let next = f
            .view(json!({ "pageOpenTime": 70_000, "predecessor": root }))
            .await;

        let children_only = SearchQuery::new("user-1", "1000")
            .with_range(1, "seconds")
            .with_children(true);
        let results = f.search.search(&children_only).await.unwrap();
        assert_eq!(ids(&results), vec![root.clone(), child.clone(), grandchild.clone()]);
        assert_eq!(results[2]["parentId"], json!(child));

        let both = children_only.with_successors(true);
        let results = f.search.search(&both).await.unwrap();
        assert_eq!(ids(&results), vec![root, next, child, grandchild]);
    }

    #[tokio::test]
    async fn test_no_matches_is_empty() {
        let f = Fixture::new().await;
        f.view(json!({ "pageOpenTime": 10_000_000 })).await;

        let results = f.search.search(&SearchQuery::new("user-1", "1000")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_only_owned_devices_are_searched() {
        let f = Fixture::new().await;
        f.store
            .insert_vertex("device-2", VertexKind::Device.initial_properties())
            .await
            .unwrap();
        f.ingest
            .ingest(&json!({ "deviceGuid": "device-2", "pageOpenTime": 1000 }))
            .await
            .unwrap();
        let mine = f.view(json!({ "pageOpenTime": 1000 })).await;

        let results = f.search.search(&SearchQuery::new("user-1", "1000")).await.unwrap();
        assert_eq!(ids(&results), vec![mine]);
    }

    mod window_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_bounds_are_inclusive(open_time in -1_000_000_000i64..1_000_000_000, range in 0i64..100_000) {
                let window = TimeWindow::around(open_time, range);
                prop_assert!(window.contains(open_time));
                prop_assert!(window.contains(open_time - range));
                prop_assert!(window.contains(open_time + range));
                prop_assert!(!window.contains(open_time + range + 1));
                prop_assert!(!window.contains(open_time - range - 1));
            }
        }
    }
}
