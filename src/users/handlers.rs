use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{parse_date, AssignPackageRequest, CreateUserRequest, ListQuery, UpdateUserRequest, UserStats},
    repo::{AccountFilter, AccountSort, NewAccount, ProfileChanges},
    repo_types::Account,
};
use crate::{
    auth::{
        password::{hash_password, is_strong_enough, MIN_PASSWORD_LEN},
        services::{is_valid_email, normalize_email},
        AdminUser,
    },
    error::{is_unique_violation, ApiError, ApiResponse, ApiResult},
    pagination::{PageWindow, Paginated},
    state::AppState,
    subscription::Assignment,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/stats", get(user_stats))
        .route("/admin/users/:id", get(get_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(create_user))
        .route("/admin/users/:id", put(update_user).delete(delete_user))
        .route("/admin/users/:id/assign-package", post(assign_package))
        .route("/admin/users/:id/remove-package", delete(remove_package))
}

fn check_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len == 0 || len > 50 {
        return Err(ApiError::BadRequest("Name must be 1 to 50 characters".into()));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if !is_strong_enough(password) {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn email_taken(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("Email already registered".into())
    } else {
        ApiError::Internal(e)
    }
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Account>>> {
    let sort = match q.sort.as_deref() {
        None => AccountSort::default(),
        Some(raw) => AccountSort::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unsupported sort field: {raw}")))?,
    };
    let filter = AccountFilter {
        role: q.role,
        is_active: q.is_active,
        subscribed: q.subscribed,
        search: q.search.map(|s| s.trim().to_string()),
    };
    let window = PageWindow::new(q.page, q.limit);

    let (accounts, total) =
        Account::list(&state.db, &filter, sort, window.limit, window.offset()).await?;
    Ok(Json(Paginated::new(window, total, accounts)))
}

#[instrument(skip_all)]
pub async fn user_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ApiResponse<UserStats>>> {
    let counts = Account::counts(&state.db).await?;
    let users_by_subscription = Account::count_by_subscription(&state.db).await?;
    let users_by_month = Account::created_by_month(&state.db).await?;

    Ok(ApiResponse::ok(UserStats {
        counts,
        users_by_subscription,
        users_by_month,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Account>>> {
    let account = state
        .accounts
        .find_account(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok(account))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn create_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Account>>)> {
    check_name(&payload.name)?;
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    check_password(&payload.password)?;

    if Account::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::BadRequest("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let account = Account::create(
        &state.db,
        NewAccount {
            name: payload.name.trim(),
            email: &email,
            password_hash: &hash,
            role: payload.role,
            is_active: payload.is_active.unwrap_or(true),
            phone: payload.phone.as_deref(),
        },
    )
    .await
    .map_err(email_taken)?;

    info!(user_id = %account.id, role = account.role.as_str(), "user created by admin");
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User created", account),
    ))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn update_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<Account>>> {
    let mut changes = ProfileChanges {
        role: payload.role,
        is_active: payload.is_active,
        phone: payload.phone,
        avatar: payload.avatar,
        ..Default::default()
    };

    if let Some(name) = payload.name {
        check_name(&name)?;
        changes.name = Some(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
        if let Some(other) = Account::find_by_email(&state.db, &email).await? {
            if other.id != id {
                return Err(ApiError::BadRequest("Email already registered".into()));
            }
        }
        changes.email = Some(email);
    }
    if let Some(password) = payload.password.filter(|p| !p.is_empty()) {
        check_password(&password)?;
        changes.password_hash = Some(hash_password(&password)?);
    }

    let account = Account::update_profile(&state.db, id, changes)
        .await
        .map_err(email_taken)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %account.id, "user updated by admin");
    Ok(ApiResponse::with_message("User updated", account))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    if admin.0.id == id {
        warn!("admin tried to delete own account");
        return Err(ApiError::BadRequest("You cannot delete your own account".into()));
    }
    if !Account::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, "user deleted");
    Ok(ApiResponse::with_message("User deleted", serde_json::json!({})))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn assign_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPackageRequest>,
) -> ApiResult<Json<ApiResponse<Account>>> {
    let package_id = payload
        .package_id
        .ok_or_else(|| ApiError::BadRequest("Package ID is required".into()))?;
    let start_date = match payload.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(
            parse_date(raw).ok_or_else(|| ApiError::BadRequest("Invalid start date".into()))?,
        ),
    };
    let custom_end_date = match payload.custom_end_date.as_deref().filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(
            parse_date(raw).ok_or_else(|| ApiError::BadRequest("Invalid custom end date".into()))?,
        ),
    };

    let account = state
        .assigner()
        .assign(
            id,
            Assignment {
                package_id,
                start_date,
                custom_end_date,
            },
        )
        .await
        .map_err(|e| {
            if e.is_not_found() {
                warn!(error = %e, "assign package target missing");
            }
            ApiError::from(e)
        })?;

    Ok(ApiResponse::with_message("Package assigned", account))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn remove_package(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Account>>> {
    let account = state.assigner().remove(id).await?;
    Ok(ApiResponse::with_message("Package removed", account))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;
    use crate::packages::repo_types::{DurationUnit, PackageType, PlanDuration};
    use crate::subscription::memory::{test_account, test_package, MemoryStore};
    use crate::users::repo_types::Role;

    fn admin() -> AdminUser {
        let mut account = test_account("admin@example.com");
        account.role = Role::Admin;
        AdminUser(account)
    }

    fn body(package_id: Uuid) -> AssignPackageRequest {
        AssignPackageRequest {
            package_id: Some(package_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn assign_then_remove_through_handlers() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("u@example.com")).await;
        let plan = store
            .insert_plan(test_package(
                PackageType::Yearly,
                Some(PlanDuration { value: 1, unit: DurationUnit::Years }),
            ))
            .await;
        let state = AppState::fake(store.clone());

        let Json(res) = assign_package(
            State(state.clone()),
            admin(),
            Path(account.id),
            Json(AssignPackageRequest {
                start_date: Some("2024-02-29".into()),
                ..body(plan.id)
            }),
        )
        .await
        .unwrap_or_else(|e| panic!("assign failed: {e}"));

        let s = &res.data.subscription;
        assert_eq!(res.message.as_deref(), Some("Package assigned"));
        assert_eq!(s.package_id, Some(plan.id));
        assert_eq!(
            s.end_date,
            Some(time::macros::datetime!(2025-02-28 0:00 UTC))
        );

        let Json(res) = remove_package(State(state), admin(), Path(account.id))
            .await
            .unwrap_or_else(|e| panic!("remove failed: {e}"));
        assert!(res.data.subscription.is_empty());
        assert!(store.account(account.id).await.unwrap().subscription.is_empty());
    }

    #[tokio::test]
    async fn assign_without_dates_starts_now() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("now@example.com")).await;
        let plan = store.insert_plan(test_package(PackageType::Lifetime, None)).await;
        let state = AppState::fake(store);

        let before = OffsetDateTime::now_utc();
        let Json(res) = assign_package(State(state), admin(), Path(account.id), Json(body(plan.id)))
            .await
            .unwrap_or_else(|e| panic!("assign failed: {e}"));

        let start = res.data.subscription.start_date.unwrap();
        assert!(start >= before);
        assert!(res.data.subscription.is_lifetime);
        assert_eq!(res.data.subscription.end_date, None);
    }

    #[tokio::test]
    async fn assign_missing_package_id_is_bad_request() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("u@example.com")).await;
        let state = AppState::fake(store.clone());

        let err = assign_package(
            State(state),
            admin(),
            Path(account.id),
            Json(AssignPackageRequest::default()),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn assign_rejects_garbage_dates() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("u@example.com")).await;
        let plan = store.insert_plan(test_package(PackageType::Lifetime, None)).await;
        let state = AppState::fake(store.clone());

        let err = assign_package(
            State(state),
            admin(),
            Path(account.id),
            Json(AssignPackageRequest {
                custom_end_date: Some("someday".into()),
                ..body(plan.id)
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Invalid custom end date");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn assign_unknown_targets_are_not_found() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("u@example.com")).await;
        let plan = store.insert_plan(test_package(PackageType::Lifetime, None)).await;
        let state = AppState::fake(store.clone());

        let err = assign_package(
            State(state.clone()),
            admin(),
            Path(Uuid::new_v4()),
            Json(body(plan.id)),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User not found");

        let err = assign_package(
            State(state),
            admin(),
            Path(account.id),
            Json(body(Uuid::new_v4())),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "Package not found");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn remove_unknown_user_is_not_found() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = remove_package(State(state), admin(), Path(Uuid::new_v4()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_user_reads_through_account_store() {
        let store = Arc::new(MemoryStore::default());
        let account = store.insert_account(test_account("g@example.com")).await;
        let state = AppState::fake(store);

        let Json(res) = get_user(State(state.clone()), admin(), Path(account.id))
            .await
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(res.data.email, "g@example.com");

        let err = get_user(State(state), admin(), Path(Uuid::new_v4()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let me = admin();
        let id = me.0.id;
        let err = delete_user(State(state), me, Path(id)).await.err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_rejects_unknown_sort() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = list_users(
            State(state),
            admin(),
            Query(ListQuery {
                sort: Some("passwordHash".into()),
                ..Default::default()
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_validates_before_db() {
        let state = AppState::fake(Arc::new(MemoryStore::default()));
        let err = create_user(
            State(state),
            admin(),
            Json(CreateUserRequest {
                name: "  ".into(),
                email: "x@example.com".into(),
                password: "secret1".into(),
                role: Role::User,
                is_active: None,
                phone: None,
            }),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
