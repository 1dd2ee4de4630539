#![forbid(unsafe_code)]

//! Server-side relay between the browser and the upstream recipe API.
//!
//! The relay holds no state of its own; it forwards requests and translates
//! the upstream-issued `jwt_token` session cookie into a local `api_token`
//! cookie so the raw credential is never exposed to page script.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as AxumPath, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub mod cookie;
pub mod token;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: String,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = std::env::var("RECIPE_RELAY_BIND").unwrap_or_else(|_| "127.0.0.1:3000".into());
        let upstream_url = std::env::var("RECIPE_RELAY_UPSTREAM_URL")
            .unwrap_or_else(|_| "https://gourmet.cours.quimerch.com".into())
            .trim_end_matches('/')
            .to_owned();
        if upstream_url.is_empty() {
            return Err(ConfigError::InvalidEnv("RECIPE_RELAY_UPSTREAM_URL"));
        }
        let upstream_timeout = match std::env::var("RECIPE_RELAY_UPSTREAM_TIMEOUT_SECONDS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidEnv("RECIPE_RELAY_UPSTREAM_TIMEOUT_SECONDS"))?,
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            bind,
            upstream_url,
            upstream_timeout,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidEnv(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEnv(var) => write!(f, "invalid value for env var {var}"),
        }
    }
}

impl std::error::Error for ConfigError {}

struct AppState {
    cfg: Config,
    http: reqwest::Client,
}

/// Builds the relay router. The upstream issues its session cookie on a
/// redirect response, so redirect following stays disabled on the outbound
/// client.
pub fn app(cfg: Config) -> Result<Router, reqwest::Error> {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(cfg.upstream_timeout)
        .build()?;
    let state = Arc::new(AppState { cfg, http });

    Ok(Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/favorites", get(favorites_list))
        .route(
            "/api/favorites/:id",
            post(favorite_add).delete(favorite_remove),
        )
        .route("/api/recipes", get(recipes_list))
        .route("/api/recipes/:id", get(recipe_get))
        .with_state(state))
}

#[derive(Debug)]
enum RelayError {
    /// Cookie missing or token unparseable.
    Unauthenticated(&'static str),
    /// Upstream rejected the call; its status is relayed with a generic body.
    Upstream(StatusCode, &'static str),
    /// Network fault or malformed upstream payload.
    Transport(&'static str),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            Self::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Upstream(status, msg) => (status, msg),
            Self::Transport(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    cookie::read_token(headers.get(COOKIE).and_then(|v| v.to_str().ok()))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(State(state): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> Response {
    let upstream = match state
        .http
        .post(format!("{}/login", state.cfg.upstream_url))
        .form(&[
            ("username", body.username.as_str()),
            ("password", body.password.as_str()),
        ])
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            tracing::warn!(error = %err, "upstream login call failed");
            return RelayError::Transport("Failed to login").into_response();
        }
    };

    // Cookie presence wins over status: an error response that still carries
    // the session cookie counts as a successful login.
    for set_cookie in upstream.headers().get_all(SET_COOKIE) {
        let Some(found) = set_cookie.to_str().ok().and_then(cookie::upstream_token) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(&cookie::session_cookie(found)) else {
            continue;
        };
        let mut resp = Json(json!({ "success": true, "username": body.username })).into_response();
        resp.headers_mut().insert(SET_COOKIE, value);
        return resp;
    }

    if !upstream.status().is_success() {
        let status = upstream.status();
        let body = upstream
            .json::<Value>()
            .await
            .unwrap_or_else(|_| json!({ "detail": "Identifiants incorrects" }));
        return (status, Json(body)).into_response();
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Login failed" })),
    )
        .into_response()
}

/// Logout is purely local-cookie invalidation; the upstream session is left
/// to expire on its own.
async fn logout() -> Response {
    let mut resp = Json(json!({ "success": true })).into_response();
    resp.headers_mut()
        .insert(SET_COOKIE, HeaderValue::from_static(cookie::CLEAR_COOKIE));
    resp
}

async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let token = session_token(&headers).ok_or(RelayError::Unauthenticated("Not authenticated"))?;

    let upstream = state
        .http
        .get(format!("{}/me", state.cfg.upstream_url))
        .header(COOKIE, cookie::upstream_cookie(token))
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "upstream me call failed");
            RelayError::Transport("Failed to get user")
        })?;

    // Any upstream rejection reads as "not authenticated", whatever the
    // specific reason.
    if !upstream.status().is_success() {
        return Err(RelayError::Unauthenticated("Not authenticated"));
    }

    let body = upstream
        .bytes()
        .await
        .map_err(|_| RelayError::Transport("Failed to get user"))?;

    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

async fn favorites_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let token = session_token(&headers).ok_or(RelayError::Unauthenticated("Not authenticated"))?;

    let upstream = state
        .http
        .get(format!("{}/favorites", state.cfg.upstream_url))
        .header(COOKIE, cookie::upstream_cookie(token))
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "upstream favorites call failed");
            RelayError::Transport("Failed to fetch favorites")
        })?;

    if !upstream.status().is_success() {
        return Err(RelayError::Upstream(
            upstream.status(),
            "Failed to fetch favorites",
        ));
    }

    // The upstream wraps each favorite as {"recipe": {...}}; flatten to the
    // bare recipe records.
    let rows: Vec<Value> = upstream
        .json()
        .await
        .map_err(|_| RelayError::Transport("Failed to fetch favorites"))?;
    let recipes: Vec<Value> = rows
        .into_iter()
        .map(|mut row| row.get_mut("recipe").map(Value::take).unwrap_or(Value::Null))
        .collect();

    Ok(Json(recipes).into_response())
}

async fn favorite_add(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    mutate_favorite(&state, &id, &headers, Method::POST, "Failed to add favorite").await
}

async fn favorite_remove(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    mutate_favorite(
        &state,
        &id,
        &headers,
        Method::DELETE,
        "Failed to remove favorite",
    )
    .await
}

/// Gate for favorite mutations: the upstream endpoint is scoped by username,
/// so the identity claim must be recoverable from the token before any
/// upstream call is made.
async fn mutate_favorite(
    state: &AppState,
    recipe_id: &str,
    headers: &HeaderMap,
    method: Method,
    failure: &'static str,
) -> Result<Response, RelayError> {
    let token = session_token(headers).ok_or(RelayError::Unauthenticated("Not authenticated"))?;
    let username =
        token::extract_claim(token).ok_or(RelayError::Unauthenticated("Invalid token"))?;

    let url = format!(
        "{}/users/{}/favorites?recipeID={}",
        state.cfg.upstream_url, username, recipe_id
    );
    let upstream = state
        .http
        .request(method, url)
        .header(COOKIE, cookie::upstream_cookie(token))
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "upstream favorite mutation failed");
            RelayError::Transport("Server error")
        })?;

    if !upstream.status().is_success() {
        return Err(RelayError::Upstream(upstream.status(), failure));
    }

    Ok(Json(json!({ "success": true })).into_response())
}

async fn recipes_list(State(state): State<Arc<AppState>>) -> Result<Response, RelayError> {
    proxy_get(
        &state,
        "/recipes",
        "Failed to fetch recipes",
        "Failed to fetch recipes",
    )
    .await
}

async fn recipe_get(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, RelayError> {
    proxy_get(
        &state,
        &format!("/recipes/{id}"),
        "Recipe not found",
        "Failed to fetch recipe",
    )
    .await
}

/// Unauthenticated pass-through for the public recipe endpoints.
async fn proxy_get(
    state: &AppState,
    path: &str,
    upstream_msg: &'static str,
    transport_msg: &'static str,
) -> Result<Response, RelayError> {
    let upstream = state
        .http
        .get(format!("{}{}", state.cfg.upstream_url, path))
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, path, "upstream recipe call failed");
            RelayError::Transport(transport_msg)
        })?;

    if !upstream.status().is_success() {
        return Err(RelayError::Upstream(upstream.status(), upstream_msg));
    }

    let body = upstream
        .bytes()
        .await
        .map_err(|_| RelayError::Transport(transport_msg))?;

    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}
