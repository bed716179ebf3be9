use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{validate, CreateServiceRequest, UpdateServiceRequest},
    repo::ServiceFields,
    repo_types::Service,
};
use crate::{
    auth::AdminUser,
    error::{ApiError, ApiResponse, ApiResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/services", get(list_services))
        .route("/admin/services/:id", get(get_service))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/services", post(create_service))
        .route("/admin/services/:id", put(update_service).delete(delete_service))
        .route("/admin/services/:id/toggle-status", patch(toggle_service))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Service not found".into())
}

#[instrument(skip_all)]
pub async fn list_services(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<Vec<Service>>>> {
    Ok(ApiResponse::ok(Service::list(&state.db).await?))
}

#[instrument(skip(state, _admin))]
pub async fn get_service(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Service>>> {
    let service = Service::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(service))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn create_service(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreateServiceRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Service>>)> {
    let fields = validate(ServiceFields::from(payload))?;
    let service = Service::create(&state.db, &fields).await?;
    info!(service_id = %service.id, "service created");
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Service created", service),
    ))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn update_service(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ApiResponse<Service>>> {
    let current = Service::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    let fields = validate(payload.merge_into(current))?;
    let service = Service::update(&state.db, id, &fields)
        .await?
        .ok_or_else(not_found)?;
    info!(service_id = %id, "service updated");
    Ok(ApiResponse::with_message("Service updated", service))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_service(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    if state.plans.service_in_use(id).await? {
        warn!(service_id = %id, "delete blocked by package features");
        return Err(ApiError::BadRequest(
            "Cannot delete service: it is used by one or more packages".into(),
        ));
    }
    if !Service::delete(&state.db, id).await? {
        return Err(not_found());
    }
    info!(service_id = %id, "service deleted");
    Ok(ApiResponse::with_message("Service deleted", serde_json::json!({})))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn toggle_service(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Service>>> {
    let service = Service::toggle_active(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    let message = if service.is_active {
        "Service activated"
    } else {
        "Service deactivated"
    };
    info!(service_id = %id, active = service.is_active, "service toggled");
    Ok(ApiResponse::with_message(message, service))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::packages::repo_types::{PackageFeature, PackageType};
    use crate::subscription::memory::{test_account, test_package, MemoryStore};
    use crate::users::repo_types::Role;

    fn admin() -> AdminUser {
        let mut account = test_account("admin@example.com");
        account.role = Role::Admin;
        AdminUser(account)
    }

    #[tokio::test]
    async fn create_validates_before_insert() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));

        let payload: CreateServiceRequest = serde_json::from_value(serde_json::json!({
            "name": "",
            "type": "basic",
            "category": "core",
            "permission": "core.read"
        }))
        .unwrap();
        let err = create_service(State(state), admin(), Json(payload))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_is_blocked_while_a_package_feature_uses_the_service() {
        let store = Arc::new(MemoryStore::default());
        let service_id = Uuid::new_v4();
        let mut plan = test_package(PackageType::Lifetime, None);
        plan.features = vec![PackageFeature {
            service_id,
            is_unlimited: true,
            limit: 0,
        }];
        store.insert_plan(plan).await;
        let state = AppState::fake(store);

        let err = delete_service(State(state), admin(), Path(service_id))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Cannot delete service: it is used by one or more packages"
        );
    }
}
