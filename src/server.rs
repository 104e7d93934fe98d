// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::cache::CacheManager;
use crate::xtream_api::{CatalogAction, PassthroughAction};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub struct AppState {
    pub cache: CacheManager,
}

impl AppState {
    pub fn new(cache: CacheManager) -> Arc<Self> {
        Arc::new(Self { cache })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/player_api.php", get(player_api))
        .route("/{asset}/{user}/{passwd}/{name}", get(stream_redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, listen: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("Xtream proxy listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Xtream proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn player_api(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    // Failures are logged by the cache; the request is served from
    // whatever it still holds.
    if let Err(e) = state.cache.maybe_refresh(Utc::now()).await {
        debug!("Serving previous cache contents after failed refresh: {}", e);
    }

    let action = params
        .get("action")
        .map(String::as_str)
        .filter(|action| !action.is_empty());

    let Some(action) = action else {
        let info = state.cache.lookup(CatalogAction::ServerInfo).await;
        return Json(info.as_ref()).into_response();
    };

    if let Some(catalog) = CatalogAction::from_action(action) {
        let payload = state.cache.lookup(catalog).await;
        return Json(payload.as_ref()).into_response();
    }

    if let Some(passthrough) = PassthroughAction::from_action(action) {
        let id = params.get(passthrough.id_param()).map(String::as_str);
        return match state.cache.api().get_info(passthrough, id).await {
            Ok(value) => Json(value).into_response(),
            Err(e) => {
                warn!("Passthrough {} failed: {}", action, e);
                let status = if e.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, Json(json!({ "error": e.to_string() }))).into_response()
            }
        };
    }

    debug!("Unsupported action {}, answering with an empty list", action);
    Json(Value::Array(Vec::new())).into_response()
}

/// The client's own credentials in the path are ignored; the upstream ones
/// are substituted.
async fn stream_redirect(
    State(state): State<Arc<AppState>>,
    Path((asset, _user, _passwd, name)): Path<(String, String, String, String)>,
    RawQuery(query): RawQuery,
) -> Redirect {
    let location = state
        .cache
        .api()
        .get_stream_url(&asset, &name, query.as_deref());
    debug!("Redirecting {}/{} to upstream", asset, name);
    Redirect::temporary(&location)
}
