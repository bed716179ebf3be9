use std::collections::BTreeMap;

use anyhow::Context;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{Service, ServiceRow, ServiceTier};

const SERVICE_COLUMNS: &str = r#"
    id, name, description, service_type, category, permission, is_active,
    metadata, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct ServiceFields {
    pub name: String,
    pub description: Option<String>,
    pub tier: ServiceTier,
    pub category: String,
    pub permission: String,
    pub is_active: bool,
    pub metadata: BTreeMap<String, String>,
}

impl From<Service> for ServiceFields {
    fn from(s: Service) -> Self {
        Self {
            name: s.name,
            description: s.description,
            tier: s.tier,
            category: s.category,
            permission: s.permission,
            is_active: s.is_active,
            metadata: s.metadata,
        }
    }
}

impl Service {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find service by id")?;
        Ok(row.map(Service::from))
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await
        .context("list services")?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    /// Ids among `ids` that have no service row.
    pub async fn missing_ids(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM services WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(db)
            .await
            .context("check service ids")?;
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    pub async fn create(db: &PgPool, f: &ServiceFields) -> anyhow::Result<Service> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            INSERT INTO services (name, description, service_type, category, permission, is_active, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.tier)
        .bind(&f.category)
        .bind(&f.permission)
        .bind(f.is_active)
        .bind(Json(&f.metadata))
        .fetch_one(db)
        .await
        .context("insert service")?;
        Ok(row.into())
    }

    pub async fn update(db: &PgPool, id: Uuid, f: &ServiceFields) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            UPDATE services SET
                name = $2, description = $3, service_type = $4, category = $5,
                permission = $6, is_active = $7, metadata = $8, updated_at = now()
            WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.tier)
        .bind(&f.category)
        .bind(&f.permission)
        .bind(f.is_active)
        .bind(Json(&f.metadata))
        .fetch_optional(db)
        .await
        .context("update service")?;
        Ok(row.map(Service::from))
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete service")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn toggle_active(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            UPDATE services SET is_active = NOT is_active, updated_at = now()
            WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("toggle service status")?;
        Ok(row.map(Service::from))
    }

    pub async fn count(db: &PgPool, active_only: bool) -> anyhow::Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM services WHERE ($1 = FALSE OR is_active)")
                .bind(active_only)
                .fetch_one(db)
                .await
                .context("count services")?;
        Ok(n)
    }
}
