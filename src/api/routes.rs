use crate::api::api_error::ApiError;
use crate::api::auth;
use crate::api::model::{RegisterRequest, RegisterResponse, UpdateRequest, UpdateResponse};
use crate::api::server::AppState;
use crate::config::{Config, SharedConfig};
use crate::db::SharedStore;
use crate::error::Error;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::headers::authorization::Basic;
use axum::headers::Authorization;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, TypedHeader};
use axum_extra::extract::WithRejection;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the API router. `/register` is only routed while registration is
/// enabled.
pub fn router(config: SharedConfig, store: SharedStore) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/update", post(update));
    if !config.api.disable_registration {
        router = router.route("/register", post(register));
    }
    let cors = cors_layer(&config);
    let timeout = TimeoutLayer::new(config.api.timeout);
    router
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .with_state(AppState { config, store })
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(
            config
                .api
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        ))
    }
}

#[allow(clippy::unused_async)]
async fn health() {}

async fn register(
    State(state): State<AppState>,
    basic: Option<TypedHeader<Authorization<Basic>>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let basic = basic.as_ref().map(|TypedHeader(auth)| auth);
    auth::register_allowed(&state.config, &state.store, basic).await?;

    // The body is optional; an absent one registers with an empty allow-list.
    let request: RegisterRequest = if body.is_empty() {
        RegisterRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| Error::MalformedJson)?
    };
    request.allow_from.is_valid()?;

    let fresh = state.store.register(&request.allow_from).await?;
    tracing::info!(user = %fresh.username, "registered new account");
    let fulldomain = format!(
        "{}.{}",
        fresh.subdomain,
        state.config.general.domain.trim_end_matches('.')
    );
    let response = RegisterResponse {
        username: fresh.username.to_string(),
        password: fresh.password,
        fulldomain,
        subdomain: fresh.subdomain,
        allowfrom: fresh.allow_from.0,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateRequest>, ApiError>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let account = auth::account_from_headers(&state.store, &headers).await?;

    if !auth::update_source_allowed(&state.config, &account, &headers, peer.ip()) {
        tracing::debug!(user = %account.username, %peer, "update not allowed from source");
        return Err(Error::Forbidden.into());
    }
    if payload.subdomain != account.subdomain {
        tracing::debug!(
            user = %account.username,
            posted = %payload.subdomain,
            "subdomain mismatch"
        );
        return Err(Error::Forbidden.into());
    }

    let post = payload.validate()?;
    state.store.update(&post).await?;
    tracing::info!(subdomain = %post.subdomain, "records updated");
    Ok(Json(UpdateResponse::from(&post)))
}
