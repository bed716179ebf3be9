mod app;
mod auth;
mod catalog;
mod config;
mod dashboard;
mod db;
mod error;
mod packages;
mod pagination;
mod state;
mod subscription;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "backoffice=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    if let Some(admin) = &app_state.config.admin {
        db::ensure_admin(&app_state.db, admin).await?;
    }

    let app = app::build_app(app_state)?;
    app::serve(app).await
}
