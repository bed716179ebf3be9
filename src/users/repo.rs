use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{
    Account, AccountCounts, AccountRow, AccountSummary, MonthlyCount, Role, SubscriptionBucket,
};
use crate::subscription::SubscriptionSnapshot;

pub(crate) const ACCOUNT_COLUMNS: &str = r#"
    id, name, email, password_hash, role, is_active, phone, avatar, last_login,
    subscription_package_id, subscription_start_date, subscription_end_date,
    subscription_is_active, subscription_is_lifetime, created_at, updated_at
"#;

#[derive(Debug)]
pub struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub is_active: bool,
    pub phone: Option<&'a str>,
}

/// Profile fields an administrator may change. `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Default)]
pub struct AccountFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub subscribed: Option<bool>,
    pub search: Option<String>,
}

impl AccountFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        if let Some(role) = self.role {
            qb.push(" AND role = ").push_bind(role);
        }
        if let Some(active) = self.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(subscribed) = self.subscribed {
            qb.push(" AND subscription_is_active = ").push_bind(subscribed);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountSort {
    #[default]
    NewestFirst,
    OldestFirst,
    NameAsc,
    NameDesc,
    EmailAsc,
    EmailDesc,
}

impl AccountSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "-createdAt" => Some(Self::NewestFirst),
            "createdAt" => Some(Self::OldestFirst),
            "name" => Some(Self::NameAsc),
            "-name" => Some(Self::NameDesc),
            "email" => Some(Self::EmailAsc),
            "-email" => Some(Self::EmailDesc),
            _ => None,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::NewestFirst => "created_at DESC",
            Self::OldestFirst => "created_at ASC",
            Self::NameAsc => "name ASC",
            Self::NameDesc => "name DESC",
            Self::EmailAsc => "email ASC",
            Self::EmailDesc => "email DESC",
        }
    }
}

impl Account {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find account by id")?;
        Ok(row.map(Account::from))
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find account by email")?;
        Ok(row.map(Account::from))
    }

    pub async fn create(db: &PgPool, new: NewAccount<'_>) -> anyhow::Result<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, is_active, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.is_active)
        .bind(new.phone)
        .fetch_one(db)
        .await
        .context("insert account")?;
        Ok(row.into())
    }

    /// Applies profile changes; the subscription columns are never touched here.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        changes: ProfileChanges,
    ) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE users SET
                name          = COALESCE($2, name),
                email         = COALESCE($3, email),
                role          = COALESCE($4, role),
                is_active     = COALESCE($5, is_active),
                phone         = COALESCE($6, phone),
                avatar        = COALESCE($7, avatar),
                password_hash = COALESCE($8, password_hash),
                updated_at    = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.role)
        .bind(changes.is_active)
        .bind(changes.phone)
        .bind(changes.avatar)
        .bind(changes.password_hash)
        .fetch_optional(db)
        .await
        .context("update account profile")?;
        Ok(row.map(Account::from))
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await
            .context("update password")?;
        Ok(())
    }

    pub async fn touch_last_login(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("update last_login")?;
        Ok(())
    }

    /// Returns `false` when nothing was deleted.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete account")?;
        Ok(res.rows_affected() > 0)
    }

    /// Overwrites all five subscription columns at once.
    pub async fn save_subscription(
        db: &PgPool,
        id: Uuid,
        snapshot: &SubscriptionSnapshot,
    ) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE users SET
                subscription_package_id  = $2,
                subscription_start_date  = $3,
                subscription_end_date    = $4,
                subscription_is_active   = $5,
                subscription_is_lifetime = $6,
                updated_at               = now()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(snapshot.package_id)
        .bind(snapshot.start_date)
        .bind(snapshot.end_date)
        .bind(snapshot.is_active)
        .bind(snapshot.is_lifetime)
        .fetch_optional(db)
        .await
        .context("save subscription snapshot")?;
        Ok(row.map(Account::from))
    }

    pub async fn list(
        db: &PgPool,
        filter: &AccountFilter,
        sort: AccountSort,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Account>, i64)> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ACCOUNT_COLUMNS} FROM users"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY ")
            .push(sort.order_by())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb
            .build_query_as::<AccountRow>()
            .fetch_all(db)
            .await
            .context("list accounts")?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        filter.push_where(&mut count);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await
            .context("count accounts")?;

        Ok((rows.into_iter().map(Account::from).collect(), total))
    }

    pub async fn count_by_package(db: &PgPool, package_id: Uuid) -> anyhow::Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE subscription_package_id = $1")
                .bind(package_id)
                .fetch_one(db)
                .await
                .context("count package subscribers")?;
        Ok(n)
    }

    pub async fn list_by_package(
        db: &PgPool,
        package_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM users
            WHERE subscription_package_id = $1
            ORDER BY subscription_start_date DESC NULLS LAST
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(package_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list package subscribers")?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    pub async fn recent(db: &PgPool, days: i64, limit: i64) -> anyhow::Result<Vec<AccountSummary>> {
        let rows = sqlx::query_as::<_, AccountSummary>(
            r#"
            SELECT id, name, email, last_login, created_at
            FROM users
            WHERE created_at >= now() - make_interval(days => $1::int)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(days)
        .bind(limit)
        .fetch_all(db)
        .await
        .context("list recent accounts")?;
        Ok(rows)
    }

    pub async fn counts(db: &PgPool) -> anyhow::Result<AccountCounts> {
        let counts = sqlx::query_as::<_, AccountCounts>(
            r#"
            SELECT COUNT(*)                                                    AS total_users,
                   COUNT(*) FILTER (WHERE is_active)                           AS active_users,
                   COUNT(*) FILTER (WHERE role = 'admin')                      AS admin_users,
                   COUNT(*) FILTER (WHERE subscription_is_active)              AS subscribed_users,
                   COUNT(*) FILTER (WHERE created_at >= now() - interval '30 days') AS new_users
            FROM users
            "#,
        )
        .fetch_one(db)
        .await
        .context("count accounts")?;
        Ok(counts)
    }

    pub async fn count_by_subscription(db: &PgPool) -> anyhow::Result<Vec<SubscriptionBucket>> {
        let rows = sqlx::query_as::<_, SubscriptionBucket>(
            r#"
            SELECT subscription_is_active AS active, COUNT(*) AS count
            FROM users
            GROUP BY subscription_is_active
            ORDER BY subscription_is_active DESC
            "#,
        )
        .fetch_all(db)
        .await
        .context("count accounts by subscription")?;
        Ok(rows)
    }

    /// Sign-ups per month over the last twelve calendar months, oldest first.
    pub async fn created_by_month(db: &PgPool) -> anyhow::Result<Vec<MonthlyCount>> {
        let rows = sqlx::query_as::<_, MonthlyCount>(
            r#"
            SELECT EXTRACT(YEAR FROM created_at)::int  AS year,
                   EXTRACT(MONTH FROM created_at)::int AS month,
                   COUNT(*)                            AS count
            FROM users
            WHERE created_at >= date_trunc('month', now()) - interval '11 months'
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .fetch_all(db)
        .await
        .context("count accounts by month")?;
        Ok(rows)
    }

    /// Accounts flagged active whose end date has passed. Expiry is read
    /// here and never written back to the snapshot.
    pub async fn count_expired(db: &PgPool) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE subscription_is_active
              AND subscription_end_date IS NOT NULL
              AND subscription_end_date < now()
            "#,
        )
        .fetch_one(db)
        .await
        .context("count expired subscriptions")?;
        Ok(n)
    }
}
