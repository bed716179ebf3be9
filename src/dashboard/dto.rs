use serde::Serialize;

use crate::packages::{repo::RevenueByType, repo_types::PackageType};
use crate::users::repo_types::{AccountSummary, MonthlyCount};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_users: i64,
    pub total_packages: i64,
    pub total_services: i64,
    pub active_subscriptions: i64,
}

/// Revenue of the packages behind currently active subscriptions.
#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub total_revenue: f64,
    pub monthly_revenue: f64,
    pub yearly_revenue: f64,
    pub lifetime_revenue: f64,
}

impl Revenue {
    pub fn from_rows(rows: &[RevenueByType]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            acc.total_revenue += row.revenue;
            match row.package_type {
                PackageType::Monthly => acc.monthly_revenue += row.revenue,
                PackageType::Yearly => acc.yearly_revenue += row.revenue,
                PackageType::Lifetime => acc.lifetime_revenue += row.revenue,
            }
            acc
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub overview: Overview,
    pub recent_users: Vec<AccountSummary>,
    pub revenue: Revenue,
    pub user_growth: Vec<MonthlyCount>,
    pub expired_subscriptions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

impl Tally {
    pub fn new(total: i64, active: i64) -> Self {
        Self {
            total,
            active,
            inactive: (total - active).max(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemOverview {
    pub users: Tally,
    pub packages: Tally,
    pub services: Tally,
    pub subscriptions: Tally,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(package_type: PackageType, revenue: f64) -> RevenueByType {
        RevenueByType {
            package_type,
            revenue,
            subscribers: 1,
        }
    }

    #[test]
    fn revenue_splits_by_package_type() {
        let revenue = Revenue::from_rows(&[
            row(PackageType::Monthly, 100.0),
            row(PackageType::Yearly, 1_000.0),
            row(PackageType::Lifetime, 5_000.0),
        ]);
        assert_eq!(
            revenue,
            Revenue {
                total_revenue: 6_100.0,
                monthly_revenue: 100.0,
                yearly_revenue: 1_000.0,
                lifetime_revenue: 5_000.0,
            }
        );
        assert_eq!(Revenue::from_rows(&[]), Revenue::default());
    }

    #[test]
    fn tally_derives_inactive() {
        assert_eq!(Tally::new(10, 7).inactive, 3);
        assert_eq!(Tally::new(0, 0).inactive, 0);
    }

    #[test]
    fn revenue_serializes_camel_case() {
        let json = serde_json::to_value(Revenue::default()).unwrap();
        assert!(json.get("lifetimeRevenue").is_some());
    }
}
