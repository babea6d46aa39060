//! User and device registration
//!
//! Search walks user -owns-> device, and ingest requires a device vertex.
//! This service creates both.

use crate::GraphStore;
use std::sync::Arc;
use trail_core::{Direction, EdgeLabel, Result, TrailError, Vertex, VertexKind};
use uuid::Uuid;

pub struct AccountService {
    store: Arc<dyn GraphStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Create a user vertex; a GUID is generated when none is given
    pub async fn register_user(&self, user_guid: Option<&str>) -> Result<Vertex> {
        let user = self.create(VertexKind::User, user_guid).await?;
        tracing::info!(id = %user.id, "Registered user");
        Ok(user)
    }

    /// Create a device vertex owned by an existing user
    pub async fn register_device(&self, user_guid: &str, device_guid: Option<&str>) -> Result<Vertex> {
        let user = self
            .store
            .get_vertex(user_guid)
            .await?
            .filter(|vertex| vertex.kind() == VertexKind::User)
            .ok_or_else(|| TrailError::InvalidReference(format!("Invalid userGuid {user_guid}")))?;

        let device = self.create(VertexKind::Device, device_guid).await?;
        self.store
            .add_edge(EdgeLabel::Owns, &user.id, &device.id)
            .await?;

        tracing::info!(user = %user.id, id = %device.id, "Registered device");
        Ok(device)
    }

    /// Devices owned by a user
    pub async fn devices(&self, user_guid: &str) -> Result<Vec<Vertex>> {
        if self.store.get_vertex(user_guid).await?.is_none() {
            return Err(TrailError::NotFound(format!("user {user_guid}")));
        }
        self.store
            .neighbors(user_guid, Direction::Out, EdgeLabel::Owns)
            .await
    }

    async fn create(&self, kind: VertexKind, guid: Option<&str>) -> Result<Vertex> {
        let guid = match guid.map(str::trim) {
            Some("") => {
                return Err(TrailError::InvalidInput(format!("{kind} GUID cannot be empty")))
            }
            Some(guid) => guid.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        self.store
            .insert_vertex(&guid, kind.initial_properties())
            .await
    }
}
