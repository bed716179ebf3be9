use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        validate, CreatePackageRequest, PackageStats, ReorderRequest, SubscribersQuery, TypeCount,
        UpdatePackageRequest,
    },
    repo::PackageFields,
    repo_types::Package,
};
use crate::{
    auth::AdminUser,
    catalog::repo_types::Service,
    error::{ApiError, ApiResponse, ApiResult},
    pagination::{PageWindow, Paginated},
    state::AppState,
    users::repo_types::Account,
};

const POPULAR_LIMIT: i64 = 5;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/packages", get(list_packages))
        .route("/admin/packages/stats", get(package_stats))
        .route("/admin/packages/:id", get(get_package))
        .route("/admin/packages/:id/subscribers", get(package_subscribers))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/packages", post(create_package))
        .route("/admin/packages/reorder", patch(reorder_packages))
        .route("/admin/packages/:id", put(update_package).delete(delete_package))
        .route("/admin/packages/:id/toggle-status", patch(toggle_package))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Package not found".into())
}

/// Every feature must point at an existing service.
async fn check_services(state: &AppState, fields: &PackageFields) -> ApiResult<()> {
    if fields.features.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = fields.features.iter().map(|f| f.service_id).collect();
    let missing = Service::missing_ids(&state.db, &ids).await?;
    if let Some(id) = missing.first() {
        return Err(ApiError::BadRequest(format!("Service {id} does not exist")));
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn list_packages(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<Vec<Package>>>> {
    let packages = Package::list(&state.db).await?;
    Ok(ApiResponse::ok(packages))
}

#[instrument(skip(state, _admin))]
pub async fn get_package(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Package>>> {
    let package = state.plans.find_plan(id).await?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(package))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn create_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreatePackageRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Package>>)> {
    let fields = validate(PackageFields::from(payload), true)?;
    check_services(&state, &fields).await?;

    let package = Package::create(&state.db, &fields).await?;
    info!(package_id = %package.id, package_type = package.package_type.as_str(), "package created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Package created", package),
    ))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn update_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePackageRequest>,
) -> ApiResult<Json<ApiResponse<Package>>> {
    let current = state.plans.find_plan(id).await?.ok_or_else(not_found)?;
    let fields = validate(payload.merge_into(current), false)?;
    check_services(&state, &fields).await?;

    let package = Package::update(&state.db, id, &fields)
        .await?
        .ok_or_else(not_found)?;
    info!(package_id = %package.id, "package updated");
    Ok(ApiResponse::with_message("Package updated", package))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    let subscribers = state.plans.subscriber_count(id).await?;
    if subscribers > 0 {
        warn!(package_id = %id, subscribers, "delete blocked by subscribers");
        return Err(ApiError::BadRequest(format!(
            "Cannot delete package: {subscribers} user(s) are subscribed to it"
        )));
    }
    if !Package::delete(&state.db, id).await? {
        return Err(not_found());
    }

    info!(package_id = %id, "package deleted");
    Ok(ApiResponse::with_message("Package deleted", serde_json::json!({})))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn toggle_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Package>>> {
    let package = Package::toggle_active(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    let message = if package.is_active {
        "Package activated"
    } else {
        "Package deactivated"
    };
    info!(package_id = %id, active = package.is_active, "package toggled");
    Ok(ApiResponse::with_message(message, package))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn reorder_packages(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<ReorderRequest>,
) -> ApiResult<Json<ApiResponse<Vec<Package>>>> {
    if payload.packages.is_empty() {
        return Err(ApiError::BadRequest("Packages array is required".into()));
    }
    let orders: Vec<(Uuid, i32)> = payload
        .packages
        .iter()
        .map(|p| (p.id, p.display_order))
        .collect();

    let ids: Vec<Uuid> = orders.iter().map(|(id, _)| *id).collect();
    if let Some(id) = state.plans.missing_plans(&ids).await?.first() {
        return Err(ApiError::NotFound(format!("Package {id} not found")));
    }
    if let Some(id) = Package::reorder(&state.db, &orders).await? {
        return Err(ApiError::NotFound(format!("Package {id} not found")));
    }
    info!(count = orders.len(), "packages reordered");

    let packages = Package::list(&state.db).await?;
    Ok(ApiResponse::with_message("Packages reordered", packages))
}

#[instrument(skip(state, _admin))]
pub async fn package_subscribers(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Query(q): Query<SubscribersQuery>,
) -> ApiResult<Json<Paginated<Account>>> {
    state.plans.find_plan(id).await?.ok_or_else(not_found)?;

    let window = PageWindow::new(q.page, q.limit);
    let total = state.plans.subscriber_count(id).await?;
    let accounts = Account::list_by_package(&state.db, id, window.limit, window.offset()).await?;
    Ok(Json(Paginated::new(window, total, accounts)))
}

#[instrument(skip_all)]
pub async fn package_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<PackageStats>>> {
    let total_packages = Package::count(&state.db, false).await?;
    let active_packages = Package::count(&state.db, true).await?;
    let packages_by_type = Package::count_by_type(&state.db)
        .await?
        .into_iter()
        .map(|(package_type, count)| TypeCount { package_type, count })
        .collect();
    let revenue_by_type = Package::revenue_by_type(&state.db).await?;
    let popular_packages = Package::popular(&state.db, POPULAR_LIMIT).await?;

    Ok(ApiResponse::ok(PackageStats {
        total_packages,
        active_packages,
        packages_by_type,
        revenue_by_type,
        popular_packages,
    }))
}
