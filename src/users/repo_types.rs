use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::subscription::SubscriptionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Registered account with its embedded subscription snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: Role,
    pub is_active: bool,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub subscription: SubscriptionSnapshot,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Flat `users` row; the subscription columns fold into a snapshot.
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub last_login: Option<OffsetDateTime>,
    pub subscription_package_id: Option<Uuid>,
    pub subscription_start_date: Option<OffsetDateTime>,
    pub subscription_end_date: Option<OffsetDateTime>,
    pub subscription_is_active: bool,
    pub subscription_is_lifetime: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<AccountRow> for Account {
    fn from(r: AccountRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role: r.role,
            is_active: r.is_active,
            phone: r.phone,
            avatar: r.avatar,
            last_login: r.last_login,
            subscription: SubscriptionSnapshot {
                package_id: r.subscription_package_id,
                start_date: r.subscription_start_date,
                end_date: r.subscription_end_date,
                is_active: r.subscription_is_active,
                is_lifetime: r.subscription_is_lifetime,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Short projection used by listings (recent users, package subscribers).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Headline account counters.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountCounts {
    pub total_users: i64,
    pub active_users: i64,
    pub admin_users: i64,
    pub subscribed_users: i64,
    pub new_users: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubscriptionBucket {
    pub active: bool,
    pub count: i64,
}

/// Accounts created in one calendar month.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: i32,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_folds_subscription_columns() {
        let package_id = Uuid::new_v4();
        let account = Account::from(AccountRow {
            id: Uuid::new_v4(),
            name: "Lan".into(),
            email: "lan@example.com".into(),
            password_hash: "hash".into(),
            role: Role::User,
            is_active: true,
            phone: None,
            avatar: None,
            last_login: None,
            subscription_package_id: Some(package_id),
            subscription_start_date: Some(OffsetDateTime::UNIX_EPOCH),
            subscription_end_date: None,
            subscription_is_active: true,
            subscription_is_lifetime: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        });
        assert_eq!(account.subscription.package_id, Some(package_id));
        assert!(account.subscription.is_lifetime);
        assert!(!account.is_admin());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "Admin".into(),
            email: "admin@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Admin,
            is_active: true,
            phone: None,
            avatar: None,
            last_login: None,
            subscription: SubscriptionSnapshot::empty(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"admin\""));
        assert!(json.contains("\"isActive\":true"));
    }
}
