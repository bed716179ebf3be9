use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ServiceTier {
    Basic,
    Premium,
    Enterprise,
}

/// A feature that packages can include.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub tier: ServiceTier,
    pub category: String,
    pub permission: String,
    pub is_active: bool,
    pub metadata: BTreeMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ServiceRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub service_type: ServiceTier,
    pub category: String,
    pub permission: String,
    pub is_active: bool,
    pub metadata: Json<BTreeMap<String, String>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ServiceRow> for Service {
    fn from(r: ServiceRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            tier: r.service_type,
            category: r.category,
            permission: r.permission,
            is_active: r.is_active,
            metadata: r.metadata.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
