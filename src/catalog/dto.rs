use std::collections::BTreeMap;

use serde::Deserialize;

use super::{
    repo::ServiceFields,
    repo_types::{Service, ServiceTier},
};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub tier: ServiceTier,
    pub category: String,
    pub permission: String,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl From<CreateServiceRequest> for ServiceFields {
    fn from(r: CreateServiceRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            tier: r.tier,
            category: r.category,
            permission: r.permission,
            is_active: r.is_active.unwrap_or(true),
            metadata: r.metadata,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub tier: Option<ServiceTier>,
    pub category: Option<String>,
    pub permission: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl UpdateServiceRequest {
    pub fn merge_into(self, current: Service) -> ServiceFields {
        let mut f = ServiceFields::from(current);
        if let Some(v) = self.name {
            f.name = v;
        }
        if let Some(v) = self.description {
            f.description = Some(v);
        }
        if let Some(v) = self.tier {
            f.tier = v;
        }
        if let Some(v) = self.category {
            f.category = v;
        }
        if let Some(v) = self.permission {
            f.permission = v;
        }
        if let Some(v) = self.is_active {
            f.is_active = v;
        }
        if let Some(v) = self.metadata {
            f.metadata = v;
        }
        f
    }
}

pub fn validate(mut f: ServiceFields) -> Result<ServiceFields, ApiError> {
    f.name = f.name.trim().to_string();
    f.category = f.category.trim().to_string();
    f.permission = f.permission.trim().to_string();
    f.description = f
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let name_len = f.name.chars().count();
    if name_len == 0 || name_len > 100 {
        return Err(ApiError::BadRequest("Service name must be 1 to 100 characters".into()));
    }
    if f.description.as_ref().is_some_and(|d| d.chars().count() > 500) {
        return Err(ApiError::BadRequest("Description cannot exceed 500 characters".into()));
    }
    if f.category.is_empty() {
        return Err(ApiError::BadRequest("Category is required".into()));
    }
    if f.permission.is_empty() {
        return Err(ApiError::BadRequest("Permission is required".into()));
    }
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CreateServiceRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn create_defaults_to_active() {
        let f = ServiceFields::from(request(serde_json::json!({
            "name": "Export",
            "type": "premium",
            "category": "reports",
            "permission": "reports.export"
        })));
        assert!(f.is_active);
        assert_eq!(f.tier, ServiceTier::Premium);
        assert!(f.metadata.is_empty());
    }

    #[test]
    fn validation_trims_and_requires_fields() {
        let f = ServiceFields::from(request(serde_json::json!({
            "name": "  Export ",
            "description": "   ",
            "type": "basic",
            "category": "reports",
            "permission": "reports.export"
        })));
        let f = validate(f).unwrap();
        assert_eq!(f.name, "Export");
        assert_eq!(f.description, None);

        let mut missing = f.clone();
        missing.permission = " ".into();
        assert_eq!(validate(missing).unwrap_err().to_string(), "Permission is required");
    }

    #[test]
    fn unknown_tier_is_rejected_by_serde() {
        let res: Result<CreateServiceRequest, _> = serde_json::from_value(serde_json::json!({
            "name": "x", "type": "gold", "category": "c", "permission": "p"
        }));
        assert!(res.is_err());
    }
}
