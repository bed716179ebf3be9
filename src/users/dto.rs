use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{AccountCounts, MonthlyCount, Role, SubscriptionBucket};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub subscribed: Option<bool>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    pub is_active: Option<bool>,
    pub phone: Option<String>,
}

/// Profile update. Subscription fields are not accepted here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /admin/users/:id/assign-package`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPackageRequest {
    pub package_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub custom_end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(flatten)]
    pub counts: AccountCounts,
    pub users_by_subscription: Vec<SubscriptionBucket>,
    pub users_by_month: Vec<MonthlyCount>,
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|d| d.midnight().assume_utc())
    })
}
