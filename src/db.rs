use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, is_strong_enough, MIN_PASSWORD_LEN};
use crate::config::{AppConfig, BootstrapAdmin};
use crate::packages::repo_types::Package;
use crate::subscription::{AccountStore, PlanCatalog};
use crate::users::repo::NewAccount;
use crate::users::repo_types::{Account, Role};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

/// Postgres-backed account store and plan catalog.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        Account::find_by_id(&self.db, id).await
    }

    async fn save_subscription(&self, account: &Account) -> anyhow::Result<Option<Account>> {
        Account::save_subscription(&self.db, account.id, &account.subscription).await
    }
}

#[async_trait]
impl PlanCatalog for PgStore {
    async fn find_plan(&self, id: Uuid) -> anyhow::Result<Option<Package>> {
        Package::find_by_id(&self.db, id).await
    }

    async fn missing_plans(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        Package::missing_ids(&self.db, ids).await
    }

    async fn subscriber_count(&self, plan_id: Uuid) -> anyhow::Result<i64> {
        Account::count_by_package(&self.db, plan_id).await
    }

    async fn service_in_use(&self, service_id: Uuid) -> anyhow::Result<bool> {
        Package::references_service(&self.db, service_id).await
    }
}

/// Creates the configured administrator unless the email is already taken.
/// A short `ADMIN_PASSWORD` fails startup.
pub async fn ensure_admin(db: &PgPool, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    if !is_strong_enough(&admin.password) {
        anyhow::bail!("ADMIN_PASSWORD must be at least {MIN_PASSWORD_LEN} characters");
    }
    if Account::find_by_email(db, &admin.email).await?.is_some() {
        info!(email = %admin.email, "bootstrap admin already exists");
        return Ok(());
    }

    let hash = hash_password(&admin.password)?;
    let account = Account::create(
        db,
        NewAccount {
            name: &admin.name,
            email: &admin.email,
            password_hash: &hash,
            role: Role::Admin,
            is_active: true,
            phone: None,
        },
    )
    .await?;
    info!(user_id = %account.id, email = %account.email, "bootstrap admin created");
    Ok(())
}
