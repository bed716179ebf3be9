use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::calendar::add_duration;
use super::snapshot::SubscriptionSnapshot;
use super::store::{AccountStore, PlanCatalog};
use crate::packages::repo_types::Package;
use crate::users::repo_types::Account;

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("account {0} not found")]
    AccountNotFound(Uuid),

    #[error("package {0} not found")]
    PlanNotFound(Uuid),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SubscriptionError::AccountNotFound(_) | SubscriptionError::PlanNotFound(_)
        )
    }
}

/// Assignment input. Dates are optional overrides.
#[derive(Debug, Clone, Copy)]
pub struct Assignment {
    pub package_id: Uuid,
    pub start_date: Option<OffsetDateTime>,
    pub custom_end_date: Option<OffsetDateTime>,
}

/// Derives the snapshot an assignment of `plan` produces.
///
/// Lifetime plans always end at `None`; otherwise an explicit end wins over
/// the plan's duration.
pub fn derive_snapshot(
    plan: &Package,
    start_date: Option<OffsetDateTime>,
    custom_end_date: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> anyhow::Result<SubscriptionSnapshot> {
    let start = start_date.unwrap_or(now);
    let is_lifetime = plan.is_lifetime();

    let end = if is_lifetime {
        None
    } else if let Some(end) = custom_end_date {
        Some(end)
    } else {
        let duration = plan
            .duration
            .ok_or_else(|| anyhow!("package {} has no duration", plan.id))?;
        let end = add_duration(start, duration)
            .ok_or_else(|| anyhow!("package {} duration overflows the calendar", plan.id))?;
        Some(end)
    };

    Ok(SubscriptionSnapshot {
        package_id: Some(plan.id),
        start_date: Some(start),
        end_date: end,
        is_active: true,
        is_lifetime,
    })
}

/// Assigns packages to accounts and removes them.
#[derive(Clone)]
pub struct SubscriptionAssigner {
    accounts: Arc<dyn AccountStore>,
    plans: Arc<dyn PlanCatalog>,
}

impl SubscriptionAssigner {
    pub fn new(accounts: Arc<dyn AccountStore>, plans: Arc<dyn PlanCatalog>) -> Self {
        Self { accounts, plans }
    }

    pub async fn assign(
        &self,
        account_id: Uuid,
        assignment: Assignment,
    ) -> Result<Account, SubscriptionError> {
        self.assign_at(account_id, assignment, OffsetDateTime::now_utc())
            .await
    }

    #[instrument(skip(self))]
    pub async fn assign_at(
        &self,
        account_id: Uuid,
        assignment: Assignment,
        now: OffsetDateTime,
    ) -> Result<Account, SubscriptionError> {
        let mut account = self
            .accounts
            .find_account(account_id)
            .await?
            .ok_or(SubscriptionError::AccountNotFound(account_id))?;
        let plan = self
            .plans
            .find_plan(assignment.package_id)
            .await?
            .ok_or(SubscriptionError::PlanNotFound(assignment.package_id))?;

        account.subscription = derive_snapshot(
            &plan,
            assignment.start_date,
            assignment.custom_end_date,
            now,
        )?;

        let saved = self
            .accounts
            .save_subscription(&account)
            .await?
            .ok_or(SubscriptionError::AccountNotFound(account_id))?;

        info!(
            %account_id,
            package_id = %plan.id,
            lifetime = saved.subscription.is_lifetime,
            "package assigned"
        );
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, account_id: Uuid) -> Result<Account, SubscriptionError> {
        let mut account = self
            .accounts
            .find_account(account_id)
            .await?
            .ok_or(SubscriptionError::AccountNotFound(account_id))?;

        if account.subscription.is_empty() {
            debug!(%account_id, "no subscription to remove");
            return Ok(account);
        }

        account.subscription = SubscriptionSnapshot::empty();
        let saved = self
            .accounts
            .save_subscription(&account)
            .await?
            .ok_or(SubscriptionError::AccountNotFound(account_id))?;

        info!(%account_id, "package removed");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::repo_types::{DurationUnit, PackageType, PlanDuration};
    use crate::subscription::memory::{test_account, test_package, MemoryStore};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-01-15 0:00 UTC);

    fn setup() -> (Arc<MemoryStore>, SubscriptionAssigner) {
        let store = Arc::new(MemoryStore::default());
        let assigner = SubscriptionAssigner::new(store.clone(), store.clone());
        (store, assigner)
    }

    fn monthly() -> Package {
        test_package(
            PackageType::Monthly,
            Some(PlanDuration { value: 1, unit: DurationUnit::Months }),
        )
    }

    fn lifetime() -> Package {
        test_package(PackageType::Lifetime, None)
    }

    fn assignment(plan: &Package) -> Assignment {
        Assignment {
            package_id: plan.id,
            start_date: None,
            custom_end_date: None,
        }
    }

    #[tokio::test]
    async fn monthly_plan_at_fixed_now() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("a@example.com")).await;
        let plan = store.insert_plan(monthly()).await;

        let saved = assigner
            .assign_at(account.id, assignment(&plan), NOW)
            .await
            .unwrap();

        let s = &saved.subscription;
        assert_eq!(s.package_id, Some(plan.id));
        assert_eq!(s.start_date, Some(datetime!(2024-01-15 0:00 UTC)));
        assert_eq!(s.end_date, Some(datetime!(2024-02-15 0:00 UTC)));
        assert!(s.is_active);
        assert!(!s.is_lifetime);

        let stored = store.account(account.id).await.unwrap();
        assert_eq!(stored.subscription, saved.subscription);
    }

    #[tokio::test]
    async fn lifetime_ignores_custom_end_date() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("b@example.com")).await;
        let plan = store.insert_plan(lifetime()).await;

        let saved = assigner
            .assign_at(
                account.id,
                Assignment {
                    custom_end_date: Some(datetime!(2099-01-01 0:00 UTC)),
                    ..assignment(&plan)
                },
                NOW,
            )
            .await
            .unwrap();

        assert_eq!(saved.subscription.end_date, None);
        assert!(saved.subscription.is_lifetime);
        assert!(saved.subscription.is_active);
    }

    #[tokio::test]
    async fn custom_end_date_overrides_duration() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("c@example.com")).await;
        let plan = store.insert_plan(monthly()).await;
        let custom = datetime!(2024-01-20 12:00 UTC);

        let saved = assigner
            .assign_at(
                account.id,
                Assignment {
                    custom_end_date: Some(custom),
                    ..assignment(&plan)
                },
                NOW,
            )
            .await
            .unwrap();

        assert_eq!(saved.subscription.end_date, Some(custom));
    }

    #[tokio::test]
    async fn explicit_start_drives_end_date() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("d@example.com")).await;
        let plan = store.insert_plan(monthly()).await;

        let saved = assigner
            .assign_at(
                account.id,
                Assignment {
                    start_date: Some(datetime!(2024-01-31 0:00 UTC)),
                    ..assignment(&plan)
                },
                NOW,
            )
            .await
            .unwrap();

        assert_eq!(saved.subscription.start_date, Some(datetime!(2024-01-31 0:00 UTC)));
        assert_eq!(saved.subscription.end_date, Some(datetime!(2024-02-29 0:00 UTC)));
    }

    #[tokio::test]
    async fn reassignment_fully_replaces_snapshot() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("e@example.com")).await;
        let first = store.insert_plan(lifetime()).await;
        let second = store.insert_plan(monthly()).await;

        assigner
            .assign_at(account.id, assignment(&first), datetime!(2023-06-01 0:00 UTC))
            .await
            .unwrap();
        let saved = assigner
            .assign_at(account.id, assignment(&second), NOW)
            .await
            .unwrap();

        assert_eq!(
            saved.subscription,
            SubscriptionSnapshot {
                package_id: Some(second.id),
                start_date: Some(NOW),
                end_date: Some(datetime!(2024-02-15 0:00 UTC)),
                is_active: true,
                is_lifetime: false,
            }
        );
    }

    #[tokio::test]
    async fn unknown_account_is_not_found_without_write() {
        let (store, assigner) = setup();
        let plan = store.insert_plan(monthly()).await;
        let missing = Uuid::new_v4();

        let err = assigner
            .assign_at(missing, assignment(&plan), NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::AccountNotFound(id) if id == missing));
        assert!(err.is_not_found());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn unknown_plan_is_not_found_without_write() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("f@example.com")).await;
        let missing = Uuid::new_v4();

        let err = assigner
            .assign_at(
                account.id,
                Assignment {
                    package_id: missing,
                    start_date: None,
                    custom_end_date: None,
                },
                NOW,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::PlanNotFound(id) if id == missing));
        assert_eq!(store.writes(), 0);
        assert!(store.account(account.id).await.unwrap().subscription.is_empty());
    }

    #[tokio::test]
    async fn remove_resets_and_is_idempotent() {
        let (store, assigner) = setup();
        let account = store.insert_account(test_account("g@example.com")).await;
        let plan = store.insert_plan(monthly()).await;
        assigner
            .assign_at(account.id, assignment(&plan), NOW)
            .await
            .unwrap();

        let first = assigner.remove(account.id).await.unwrap();
        assert!(first.subscription.is_empty());
        let writes = store.writes();

        let second = assigner.remove(account.id).await.unwrap();
        assert!(second.subscription.is_empty());
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn remove_unknown_account_is_not_found() {
        let (_store, assigner) = setup();
        let err = assigner.remove(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::AccountNotFound(_)));
    }

    #[test]
    fn termed_plan_without_duration_is_rejected() {
        let broken = test_package(PackageType::Yearly, None);
        let err = derive_snapshot(&broken, None, None, NOW).unwrap_err();
        assert!(err.to_string().contains("has no duration"));
    }

    #[test]
    fn lifetime_snapshot_never_has_end_date() {
        let plan = lifetime();
        for custom in [None, Some(NOW), Some(datetime!(2099-01-01 0:00 UTC))] {
            let s = derive_snapshot(&plan, None, custom, NOW).unwrap();
            assert!(s.is_lifetime);
            assert_eq!(s.end_date, None);
        }
    }
}
