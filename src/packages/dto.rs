use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    repo::{PackageFields, PopularPackage, RevenueByType},
    repo_types::{Currency, Package, PackageFeature, PackageMetadata, PackageType, PlanDuration},
};
use crate::error::ApiError;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePackageRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub price: f64,
    pub original_price: Option<f64>,
    #[serde(default)]
    pub currency: Currency,
    pub duration: Option<PlanDuration>,
    #[serde(default)]
    pub features: Vec<PackageFeature>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub metadata: PackageMetadata,
}

impl From<CreatePackageRequest> for PackageFields {
    fn from(r: CreatePackageRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            package_type: r.package_type,
            price: r.price,
            original_price: r.original_price,
            currency: r.currency,
            duration: r.duration,
            features: r.features,
            is_active: r.is_active.unwrap_or(true),
            is_popular: r.is_popular,
            display_order: r.display_order,
            metadata: r.metadata,
        }
    }
}

/// Partial update, merged over the stored package before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePackageRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub package_type: Option<PackageType>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub currency: Option<Currency>,
    pub duration: Option<PlanDuration>,
    pub features: Option<Vec<PackageFeature>>,
    pub is_active: Option<bool>,
    pub is_popular: Option<bool>,
    pub display_order: Option<i32>,
    pub metadata: Option<PackageMetadata>,
}

impl UpdatePackageRequest {
    pub fn merge_into(self, current: Package) -> PackageFields {
        let mut f = PackageFields::from(current);
        if let Some(v) = self.name {
            f.name = v;
        }
        if let Some(v) = self.description {
            f.description = Some(v);
        }
        if let Some(v) = self.package_type {
            f.package_type = v;
        }
        if let Some(v) = self.price {
            f.price = v;
        }
        if let Some(v) = self.original_price {
            f.original_price = Some(v);
        }
        if let Some(v) = self.currency {
            f.currency = v;
        }
        if let Some(v) = self.duration {
            f.duration = Some(v);
        }
        if let Some(v) = self.features {
            f.features = v;
        }
        if let Some(v) = self.is_active {
            f.is_active = v;
        }
        if let Some(v) = self.is_popular {
            f.is_popular = v;
        }
        if let Some(v) = self.display_order {
            f.display_order = v;
        }
        if let Some(v) = self.metadata {
            f.metadata = v;
        }
        f
    }
}

/// Checks field rules and normalizes: trims text, drops the duration of
/// lifetime packages and zeroes the limit of unlimited features.
pub fn validate(mut f: PackageFields, require_features: bool) -> Result<PackageFields, ApiError> {
    f.name = f.name.trim().to_string();
    let name_len = f.name.chars().count();
    if name_len == 0 || name_len > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Package name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }

    f.description = f
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if f
        .description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
    {
        return Err(ApiError::BadRequest(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    if !f.price.is_finite() || f.price < 0.0 {
        return Err(ApiError::BadRequest("Price must be a non-negative number".into()));
    }
    if f.original_price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(ApiError::BadRequest(
            "Original price must be a non-negative number".into(),
        ));
    }

    if f.package_type == PackageType::Lifetime {
        f.duration = None;
    } else {
        match f.duration {
            None => {
                return Err(ApiError::BadRequest(
                    "Duration is required for non-lifetime packages".into(),
                ))
            }
            Some(d) if d.value < 1 => {
                return Err(ApiError::BadRequest("Duration value must be at least 1".into()))
            }
            Some(_) => {}
        }
    }

    if require_features && f.features.is_empty() {
        return Err(ApiError::BadRequest(
            "Package must include at least one feature".into(),
        ));
    }
    for feature in &mut f.features {
        if feature.is_unlimited {
            feature.limit = 0;
        } else if feature.limit < 0 {
            return Err(ApiError::BadRequest("Feature limit cannot be negative".into()));
        }
    }

    Ok(f)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderEntry {
    pub id: Uuid,
    pub display_order: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub packages: Vec<ReorderEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStats {
    pub total_packages: i64,
    pub active_packages: i64,
    pub packages_by_type: Vec<TypeCount>,
    pub revenue_by_type: Vec<RevenueByType>,
    pub popular_packages: Vec<PopularPackage>,
}
