use {
    axum::{extract::State, response::IntoResponse, routing::get, Json, Router},
    psp_reconciler::{adapters::registry, config::Config, runtime::supervisor, telemetry},
    sqlx::postgres::PgPoolOptions,
    std::time::Duration,
    tower::ServiceBuilder,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

#[derive(Clone)]
struct HealthState {
    pool: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_dsn)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let adapters = registry::build(&config);

    let health_state = HealthState { pool: pool.clone() };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(5))),
        )
        .with_state(health_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "health server exited");
        }
    });

    supervisor::run(
        pool,
        config,
        adapters,
        shutdown_signal(),
        Duration::from_secs(30),
    )
    .await;

    server.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn livez() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "up" }))
}

async fn healthz(State(state): State<HealthState>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready", "error": e.to_string() })),
        ),
    }
}
