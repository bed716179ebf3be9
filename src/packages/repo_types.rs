use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Package type. `Lifetime` carries no duration and never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PackageType {
    Monthly,
    Yearly,
    Lifetime,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Monthly => "monthly",
            PackageType::Yearly => "yearly",
            PackageType::Lifetime => "lifetime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Months,
    Years,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDuration {
    pub value: i32,
    pub unit: DurationUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum Currency {
    #[default]
    #[serde(rename = "VND")]
    #[sqlx(rename = "VND")]
    Vnd,
    #[serde(rename = "USD")]
    #[sqlx(rename = "USD")]
    Usd,
}

/// A service included in a package. `limit` is 0 when unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFeature {
    pub service_id: Uuid,
    #[serde(default = "default_true")]
    pub is_unlimited: bool,
    #[serde(default)]
    pub limit: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// A purchasable plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
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
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Package {
    pub fn is_lifetime(&self) -> bool {
        self.package_type == PackageType::Lifetime
    }
}

#[derive(Debug, FromRow)]
pub struct PackageRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub package_type: PackageType,
    pub price: f64,
    pub original_price: Option<f64>,
    pub currency: Currency,
    pub duration_value: Option<i32>,
    pub duration_unit: Option<DurationUnit>,
    pub features: Json<Vec<PackageFeature>>,
    pub is_active: bool,
    pub is_popular: bool,
    pub display_order: i32,
    pub metadata: Json<PackageMetadata>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<PackageRow> for Package {
    fn from(r: PackageRow) -> Self {
        let duration = match (r.package_type, r.duration_value, r.duration_unit) {
            (PackageType::Lifetime, _, _) => None,
            (_, Some(value), Some(unit)) => Some(PlanDuration { value, unit }),
            _ => None,
        };
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            package_type: r.package_type,
            price: r.price,
            original_price: r.original_price,
            currency: r.currency,
            duration,
            features: r.features.0,
            is_active: r.is_active,
            is_popular: r.is_popular,
            display_order: r.display_order,
            metadata: r.metadata.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
