use axum::{extract::State, routing::get, Json, Router};
use tracing::{debug, instrument};

use super::dto::{Dashboard, Overview, Revenue, SystemOverview, Tally};
use crate::{
    auth::AdminUser,
    catalog::repo_types::Service,
    error::{ApiResponse, ApiResult},
    packages::repo_types::Package,
    state::AppState,
    users::repo_types::Account,
};

const RECENT_DAYS: i64 = 7;
const RECENT_LIMIT: i64 = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/overview", get(system_overview))
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<Dashboard>>> {
    let counts = Account::counts(&state.db).await?;
    let total_packages = Package::count(&state.db, false).await?;
    let total_services = Service::count(&state.db, false).await?;

    let recent_users = Account::recent(&state.db, RECENT_DAYS, RECENT_LIMIT).await?;
    let revenue = Revenue::from_rows(&Package::revenue_by_type(&state.db).await?);
    let user_growth = Account::created_by_month(&state.db).await?;
    let expired_subscriptions = Account::count_expired(&state.db).await?;
    debug!(expired_subscriptions, "dashboard computed");

    Ok(ApiResponse::ok(Dashboard {
        overview: Overview {
            total_users: counts.total_users,
            total_packages,
            total_services,
            active_subscriptions: counts.subscribed_users,
        },
        recent_users,
        revenue,
        user_growth,
        expired_subscriptions,
    }))
}

#[instrument(skip_all)]
pub async fn system_overview(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<SystemOverview>>> {
    let counts = Account::counts(&state.db).await?;
    let packages = Tally::new(
        Package::count(&state.db, false).await?,
        Package::count(&state.db, true).await?,
    );
    let services = Tally::new(
        Service::count(&state.db, false).await?,
        Service::count(&state.db, true).await?,
    );

    Ok(ApiResponse::ok(SystemOverview {
        users: Tally::new(counts.total_users, counts.active_users),
        packages,
        services,
        subscriptions: Tally::new(counts.total_users, counts.subscribed_users),
    }))
}
