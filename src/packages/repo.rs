use anyhow::Context;
use serde::Serialize;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::repo_types::{
    Currency, Package, PackageFeature, PackageMetadata, PackageRow, PackageType, PlanDuration,
};

const PACKAGE_COLUMNS: &str = r#"
    id, name, description, package_type, price, original_price, currency,
    duration_value, duration_unit, features, is_active, is_popular, display_order,
    metadata, created_at, updated_at
"#;

/// Validated package fields, used for both insert and full update.
#[derive(Debug, Clone)]
pub struct PackageFields {
    pub name: String,
    pub description: Option<String>,
    pub package_type: PackageType,
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: Currency,
    pub duration: Option<PlanDuration>,
    pub features: Vec<PackageFeature>,
    pub is_active: bool,
    pub is_popular: bool,
    pub display_order: i32,
    pub metadata: PackageMetadata,
}

impl From<Package> for PackageFields {
    fn from(p: Package) -> Self {
        Self {
            name: p.name,
            description: p.description,
            package_type: p.package_type,
            price: p.price,
            original_price: p.original_price,
            currency: p.currency,
            duration: p.duration,
            features: p.features,
            is_active: p.is_active,
            is_popular: p.is_popular,
            display_order: p.display_order,
            metadata: p.metadata,
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RevenueByType {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub revenue: f64,
    pub subscribers: i64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PopularPackage {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub price: f64,
    pub subscribers: i64,
}

impl Package {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Package>> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find package by id")?;
        Ok(row.map(Package::from))
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Package>> {
        let rows = sqlx::query_as::<_, PackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages ORDER BY display_order ASC, created_at DESC"
        ))
        .fetch_all(db)
        .await
        .context("list packages")?;
        Ok(rows.into_iter().map(Package::from).collect())
    }

    pub async fn create(db: &PgPool, f: &PackageFields) -> anyhow::Result<Package> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            r#"
            INSERT INTO packages (
                name, description, package_type, price, original_price, currency,
                duration_value, duration_unit, features, is_active, is_popular,
                display_order, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {PACKAGE_COLUMNS}
            "#
        ))
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.package_type)
        .bind(f.price)
        .bind(f.original_price)
        .bind(f.currency)
        .bind(f.duration.map(|d| d.value))
        .bind(f.duration.map(|d| d.unit))
        .bind(Json(&f.features))
        .bind(f.is_active)
        .bind(f.is_popular)
        .bind(f.display_order)
        .bind(Json(&f.metadata))
        .fetch_one(db)
        .await
        .context("insert package")?;
        Ok(row.into())
    }

    pub async fn update(db: &PgPool, id: Uuid, f: &PackageFields) -> anyhow::Result<Option<Package>> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            r#"
            UPDATE packages SET
                name = $2, description = $3, package_type = $4, price = $5,
                original_price = $6, currency = $7, duration_value = $8,
                duration_unit = $9, features = $10, is_active = $11,
                is_popular = $12, display_order = $13, metadata = $14,
                updated_at = now()
            WHERE id = $1
            RETURNING {PACKAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.package_type)
        .bind(f.price)
        .bind(f.original_price)
        .bind(f.currency)
        .bind(f.duration.map(|d| d.value))
        .bind(f.duration.map(|d| d.unit))
        .bind(Json(&f.features))
        .bind(f.is_active)
        .bind(f.is_popular)
        .bind(f.display_order)
        .bind(Json(&f.metadata))
        .fetch_optional(db)
        .await
        .context("update package")?;
        Ok(row.map(Package::from))
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete package")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn toggle_active(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Package>> {
        let row = sqlx::query_as::<_, PackageRow>(&format!(
            r#"
            UPDATE packages SET is_active = NOT is_active, updated_at = now()
            WHERE id = $1
            RETURNING {PACKAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("toggle package status")?;
        Ok(row.map(Package::from))
    }

    /// Applies all display-order changes in one transaction. Returns the first
    /// id that matched no row; nothing is committed in that case.
    pub async fn reorder(db: &PgPool, orders: &[(Uuid, i32)]) -> anyhow::Result<Option<Uuid>> {
        let mut tx = db.begin().await.context("begin tx")?;
        for (id, order) in orders {
            let res = sqlx::query(
                "UPDATE packages SET display_order = $2, updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(order)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("reorder package {}", id))?;
            if res.rows_affected() == 0 {
                return Ok(Some(*id));
            }
        }
        tx.commit().await.context("commit tx")?;
        Ok(None)
    }

    pub async fn missing_ids(db: &PgPool, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM packages WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(db)
            .await
            .context("check package ids")?;
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    /// True while any package feature references `service_id`.
    pub async fn references_service(db: &PgPool, service_id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM packages
                WHERE features @> jsonb_build_array(jsonb_build_object('serviceId', $1::text))
            )
            "#,
        )
        .bind(service_id.to_string())
        .fetch_one(db)
        .await
        .context("check service references")?;
        Ok(exists)
    }

    pub async fn count(db: &PgPool, active_only: bool) -> anyhow::Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE ($1 = FALSE OR is_active)")
                .bind(active_only)
                .fetch_one(db)
                .await
                .context("count packages")?;
        Ok(n)
    }

    pub async fn count_by_type(db: &PgPool) -> anyhow::Result<Vec<(PackageType, i64)>> {
        let rows = sqlx::query_as::<_, (PackageType, i64)>(
            "SELECT package_type, COUNT(*) FROM packages GROUP BY package_type",
        )
        .fetch_all(db)
        .await
        .context("count packages by type")?;
        Ok(rows)
    }

    /// Price sum and subscriber count per package type over active subscriptions.
    pub async fn revenue_by_type(db: &PgPool) -> anyhow::Result<Vec<RevenueByType>> {
        let rows = sqlx::query_as::<_, RevenueByType>(
            r#"
            SELECT p.package_type,
                   COALESCE(SUM(p.price), 0)::float8 AS revenue,
                   COUNT(*) AS subscribers
            FROM users u
            JOIN packages p ON p.id = u.subscription_package_id
            WHERE u.subscription_is_active
            GROUP BY p.package_type
            ORDER BY p.package_type
            "#,
        )
        .fetch_all(db)
        .await
        .context("revenue by package type")?;
        Ok(rows)
    }

    pub async fn popular(db: &PgPool, limit: i64) -> anyhow::Result<Vec<PopularPackage>> {
        let rows = sqlx::query_as::<_, PopularPackage>(
            r#"
            SELECT p.id, p.name, p.package_type, p.price, COUNT(*) AS subscribers
            FROM users u
            JOIN packages p ON p.id = u.subscription_package_id
            GROUP BY p.id, p.name, p.package_type, p.price
            ORDER BY subscribers DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(db)
        .await
        .context("popular packages")?;
        Ok(rows)
    }
}
