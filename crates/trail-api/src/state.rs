//! Application state management
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use trail_core::config::AppConfig;
use trail_graph::{
    AccountService, GraphStore, MemoryGraphStore, PageViewService, SearchService,
};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Graph store shared by every service
    pub store: Arc<dyn GraphStore>,
    pub page_views: PageViewService,
    pub search: SearchService,
    pub accounts: AccountService,
    /// Per-endpoint request metrics
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
}

impl AppState {
    /// Create new application state over an already connected store
    pub fn new(config: AppConfig, store: Arc<dyn GraphStore>) -> Self {
        let search = SearchService::new(store.clone()).with_defaults(config.search.clone());

        Self {
            page_views: PageViewService::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            search,
            store,
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// State backed by a fresh in-memory graph
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryGraphStore::new()))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        let mut metrics = self.metrics.write().await;
        metrics.entry(endpoint).or_default().record(status, latency_us);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}

/// Counters for one normalized endpoint
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub status_counts: HashMap<u16, u64>,
    pub latency_count: u64,
    pub total_latency_us: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub latency_buckets: LatencyBuckets,
}

impl EndpointMetrics {
    fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;

        self.min_latency_us = if self.latency_count == 0 {
            latency_us
        } else {
            self.min_latency_us.min(latency_us)
        };
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.latency_count += 1;
        self.total_latency_us = self.total_latency_us.saturating_add(latency_us);
        self.latency_buckets.observe(latency_us);
    }
}

/// Non-cumulative latency histogram
#[derive(Debug, Clone, Default)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn observe(&mut self, latency_us: u64) {
        let bucket = match latency_us / 1000 {
            0..=9 => &mut self.under_10ms,
            10..=49 => &mut self.ms_10_50,
            50..=99 => &mut self.ms_50_100,
            100..=499 => &mut self.ms_100_500,
            500..=999 => &mut self.ms_500_1000,
            _ => &mut self.over_1s,
        };
        *bucket += 1;
    }
}
