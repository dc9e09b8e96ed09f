use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use shared::{
    domain::ArticleId,
    error::{ApiError, ErrorCode},
    protocol::{
        ArticleListResponse, ArticleResponse, LoginRequest, LoginResponse, MessageResponse,
    },
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod token;

use api::{ApiContext, ArticleBook, DraftPayload};
use config::load_settings;
use token::TokenConfig;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let api = ApiContext::new(
        TokenConfig {
            secret: settings.token_secret,
            ttl_seconds: settings.token_ttl_seconds,
        },
        ArticleBook::seeded(),
    );
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "articles api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route("/api/articles", get(list_articles).post(create_article))
        .route(
            "/api/articles/:article_id",
            put(update_article).delete(delete_article),
        )
        .with_state(state)
}

fn status_for(error: &ApiError) -> StatusCode {
    match error.code {
        Some(ErrorCode::Unauthorized) => StatusCode::UNAUTHORIZED,
        Some(ErrorCode::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorCode::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorCode::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(&error), Json(error))
}

fn authorized(state: &AppState, headers: &HeaderMap) -> Result<String, (StatusCode, Json<ApiError>)> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    api::authenticate(&state.api, authorization).map_err(reject)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    api::login(&state.api, &req.username, &req.password)
        .map(Json)
        .map_err(reject)
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<ArticleListResponse> {
    let username = authorized(&state, &headers)?;
    api::list_articles(&state.api, &username)
        .await
        .map(Json)
        .map_err(reject)
}

async fn create_article(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<DraftPayload>,
) -> ApiResult<ArticleResponse> {
    let username = authorized(&state, &headers)?;
    api::create_article(&state.api, &username, payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_article(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<DraftPayload>,
) -> ApiResult<ArticleResponse> {
    let username = authorized(&state, &headers)?;
    api::update_article(&state.api, &username, ArticleId(article_id), payload)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<MessageResponse> {
    let username = authorized(&state, &headers)?;
    api::delete_article(&state.api, &username, ArticleId(article_id))
        .await
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
