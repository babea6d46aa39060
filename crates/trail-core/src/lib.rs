//! Trail Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the Trail system:
//! - Graph model (vertices, vertex kinds, edge labels, directions)
//! - Page-view attribute merging
//! - Search request/response types
//! - Common error types
//! - Configuration management

pub mod attributes;
pub mod config;

pub use attributes::PageViewAttributes;
pub use config::{AppConfig, ConfigError, DatabaseConfig, GraphBackend, SearchConfig};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Trail operations
#[derive(Error, Debug)]
pub enum TrailError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed attributes: {0}")]
    MalformedAttributes(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrailError>;

// ============================================================================
// Graph Model
// ============================================================================

/// Flat property map stored on a vertex
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Property holding the vertex kind tag
pub const TYPE_KEY: &str = "type";

/// Property holding a domain vertex's normalized host
pub const DOMAIN_KEY: &str = "domain";

/// Property holding a page view's open time (epoch milliseconds)
pub const PAGE_OPEN_TIME_KEY: &str = "pageOpenTime";

/// Logical vertex kinds, distinguished by the `type` property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VertexKind {
    User,
    Device,
    /// Page views carry no `type` tag
    PageView,
    Domain,
}

impl VertexKind {
    /// Value written to the `type` property, if any
    pub fn tag(self) -> Option<&'static str> {
        match self {
            Self::User => Some("user"),
            Self::Device => Some("device"),
            Self::PageView => None,
            Self::Domain => Some("domain"),
        }
    }

    /// Kind for a `type` property value; untagged and unknown vertices are page views
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("user") => Self::User,
            Some("device") => Self::Device,
            Some("domain") => Self::Domain,
            _ => Self::PageView,
        }
    }

    /// Properties a fresh vertex of this kind starts with
    pub fn initial_properties(self) -> Properties {
        let mut properties = Properties::new();
        if let Some(tag) = self.tag() {
            properties.insert(TYPE_KEY.to_string(), tag.into());
        }
        properties
    }
}

impl std::fmt::Display for VertexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Device => write!(f, "device"),
            Self::PageView => write!(f, "pageView"),
            Self::Domain => write!(f, "domain"),
        }
    }
}

/// A vertex in the browsing graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Store-assigned identifier
    pub id: String,

    /// Property values
    pub properties: Properties,
}

impl Vertex {
    /// Create a vertex
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    /// The single place vertex kinds are decided
    pub fn kind(&self) -> VertexKind {
        VertexKind::from_tag(self.properties.get(TYPE_KEY).and_then(|v| v.as_str()))
    }

    /// Get a property value
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Page open time in epoch milliseconds
    pub fn page_open_time(&self) -> Option<i64> {
        match self.properties.get(PAGE_OPEN_TIME_KEY)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Normalized host of a domain vertex
    pub fn domain(&self) -> Option<&str> {
        self.properties.get(DOMAIN_KEY).and_then(|v| v.as_str())
    }
}

/// Edge labels of the browsing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeLabel {
    /// User -> Device
    Owns,
    /// Device -> PageView
    Viewed,
    /// PageView -> Domain
    Under,
    /// PageView(child) -> PageView(parent)
    ChildOf,
    /// PageView(later) -> PageView(earlier)
    SuccessorTo,
    /// PageView(parent) -> PageView(child)
    ParentOf,
    /// PageView(earlier) -> PageView(later)
    PredecessorTo,
}

impl EdgeLabel {
    pub const ALL: [EdgeLabel; 7] = [
        Self::Owns,
        Self::Viewed,
        Self::Under,
        Self::ChildOf,
        Self::SuccessorTo,
        Self::ParentOf,
        Self::PredecessorTo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owns => "owns",
            Self::Viewed => "viewed",
            Self::Under => "under",
            Self::ChildOf => "childOf",
            Self::SuccessorTo => "successorTo",
            Self::ParentOf => "parentOf",
            Self::PredecessorTo => "predecessorTo",
        }
    }

    /// The label written in the opposite direction alongside this one
    pub fn reverse(self) -> Option<EdgeLabel> {
        match self {
            Self::ChildOf => Some(Self::ParentOf),
            Self::ParentOf => Some(Self::ChildOf),
            Self::SuccessorTo => Some(Self::PredecessorTo),
            Self::PredecessorTo => Some(Self::SuccessorTo),
            Self::Owns | Self::Viewed | Self::Under => None,
        }
    }
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeLabel {
    type Err = TrailError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| TrailError::InvalidInput(format!("unknown edge label: {s}")))
    }
}

/// Direction of an edge relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Out,
    In,
}

// ============================================================================
// Ingest Types
// ============================================================================

/// Result of ingesting one page view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Id of the new page-view vertex
    pub id: String,

    /// Advisory status of the predecessor link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<String>,

    /// Advisory status of the parent link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl IngestOutcome {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predecessor: None,
            parent: None,
        }
    }
}

// ============================================================================
// Search Types
// ============================================================================

/// Units accepted for a search time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    /// Unrecognized units; the range is used as given
    Unconverted,
}

impl TimeUnit {
    pub fn parse(units: &str) -> Self {
        match units {
            "seconds" => Self::Seconds,
            "minutes" => Self::Minutes,
            "hours" => Self::Hours,
            _ => Self::Unconverted,
        }
    }

    /// Convert a range in these units to seconds
    pub fn to_seconds(self, range: i64) -> i64 {
        match self {
            Self::Seconds | Self::Unconverted => range,
            Self::Minutes => range.saturating_mul(60),
            Self::Hours => range.saturating_mul(60 * 60),
        }
    }
}

/// Search request over a user's browsing history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// The user to retrieve page views for
    #[serde(default)]
    pub user_guid: String,

    /// Only page views under this domain
    #[serde(default)]
    pub domain: Option<String>,

    /// The middle of the time window (epoch milliseconds)
    #[serde(default)]
    pub open_time: String,

    /// Range around `open_time`; the configured default applies when absent
    #[serde(default)]
    pub time_range: Option<i64>,

    /// `seconds`, `minutes` or `hours`
    #[serde(default)]
    pub time_range_units: Option<String>,

    /// Follow `predecessorTo` edges from every result
    #[serde(default)]
    pub include_successors: bool,

    /// Follow `parentOf` edges from every result
    #[serde(default)]
    pub include_children: bool,
}

impl SearchQuery {
    pub fn new(user_guid: impl Into<String>, open_time: impl Into<String>) -> Self {
        Self {
            user_guid: user_guid.into(),
            open_time: open_time.into(),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: i64, units: impl Into<String>) -> Self {
        self.time_range = Some(range);
        self.time_range_units = Some(units.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_successors(mut self, include: bool) -> Self {
        self.include_successors = include;
        self
    }

    pub fn with_children(mut self, include: bool) -> Self {
        self.include_children = include;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
