use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::snapshot::SubscriptionSnapshot;
use super::store::{AccountStore, PlanCatalog};
use crate::packages::repo_types::{
    Currency, Package, PackageMetadata, PackageType, PlanDuration,
};
use crate::users::repo_types::{Account, Role};

/// In-memory accounts and plans; counts snapshot writes.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    plans: RwLock<HashMap<Uuid, Package>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub async fn insert_account(&self, account: Account) -> Account {
        self.accounts
            .write()
            .await
            .insert(account.id, account.clone());
        account
    }

    pub async fn insert_plan(&self, plan: Package) -> Package {
        self.plans.write().await.insert(plan.id, plan.clone());
        plan
    }

    pub async fn account(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<Account>> {
        Ok(self.account(id).await)
    }

    async fn save_subscription(&self, account: &Account) -> anyhow::Result<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        let Some(stored) = accounts.get_mut(&account.id) else {
            return Ok(None);
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        stored.subscription = account.subscription.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.clone()))
    }
}

#[async_trait]
impl PlanCatalog for MemoryStore {
    async fn find_plan(&self, id: Uuid) -> anyhow::Result<Option<Package>> {
        Ok(self.plans.read().await.get(&id).cloned())
    }

    async fn missing_plans(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let plans = self.plans.read().await;
        Ok(ids.iter().copied().filter(|id| !plans.contains_key(id)).collect())
    }

    async fn subscriber_count(&self, plan_id: Uuid) -> anyhow::Result<i64> {
        let accounts = self.accounts.read().await;
        let n = accounts
            .values()
            .filter(|a| a.subscription.package_id == Some(plan_id))
            .count();
        Ok(n as i64)
    }

    async fn service_in_use(&self, service_id: Uuid) -> anyhow::Result<bool> {
        let plans = self.plans.read().await;
        Ok(plans
            .values()
            .any(|p| p.features.iter().any(|f| f.service_id == service_id)))
    }
}

pub fn test_account(email: &str) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: "Test User".into(),
        email: email.into(),
        password_hash: String::new(),
        role: Role::User,
        is_active: true,
        phone: None,
        avatar: None,
        last_login: None,
        subscription: SubscriptionSnapshot::empty(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn test_package(package_type: PackageType, duration: Option<PlanDuration>) -> Package {
    Package {
        id: Uuid::new_v4(),
        name: format!("{} plan", package_type.as_str()),
        description: None,
        package_type,
        price: 100_000.0,
        original_price: None,
        currency: Currency::Vnd,
        duration,
        features: vec![],
        is_active: true,
        is_popular: false,
        display_order: 0,
        metadata: PackageMetadata::default(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}
