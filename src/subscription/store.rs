use async_trait::async_trait;
use uuid::Uuid;

use crate::packages::repo_types::Package;
use crate::users::repo_types::Account;

/// Account lookup and persistence used by the subscription assigner.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: Uuid) -> anyhow::Result<Option<Account>>;

    /// Writes `account.subscription` over the stored snapshot and returns the
    /// stored account. `None` if the account disappeared in between.
    async fn save_subscription(&self, account: &Account) -> anyhow::Result<Option<Account>>;
}

/// Plan lookups plus the reference checks that guard catalog deletes.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_plan(&self, id: Uuid) -> anyhow::Result<Option<Package>>;

    /// Ids from `ids` with no stored plan, in input order.
    async fn missing_plans(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>>;

    /// Accounts whose snapshot points at the plan, active or not.
    async fn subscriber_count(&self, plan_id: Uuid) -> anyhow::Result<i64>;

    async fn service_in_use(&self, service_id: Uuid) -> anyhow::Result<bool>;
}
