//! Actix Web HTTP server.
//!
//! Exposes the NetPad MCP surface on localhost:
//! - `GET /` -> NetPad info
//! - `GET /tools`, `GET /tools/{id}`, `GET /schema` (query forwarded)
//! - `POST /command`
//! - `GET /api/openai-functions` (tool list translated to OpenAI functions)
//! - `GET /health`
//!
//! Anything else gets a fixed JSON 404.

use crate::{
    config::ProxyConfig,
    forwarder::{Forwarder, InboundRequest, Route},
    normalize::NormalizedResult,
    translation,
};
use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
}

pub async fn serve(config: ProxyConfig, forwarder: Forwarder) -> Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    let base_url = forwarder
        .store()
        .base_url()
        .context("failed to read netpadUrl from the credential store")?;
    info!(addr = %addr, netpad_url = %base_url, "netpad-proxy listening");

    let state = web::Data::new(AppState { forwarder });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(configure_routes)
            .default_service(web::to(not_found))
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

/// Route table, shared by [`serve`] and the tests.
///
/// Each resource falls back to [`not_found`] so a known path with the wrong
/// method gets the same 404 as an unknown path.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/health", web::get().to(health_check)))
        .service(resource("/", web::get().to(handle_info)))
        .service(resource("/tools", web::get().to(handle_tools)))
        .service(resource("/tools/{id}", web::get().to(handle_tool_detail)))
        .service(resource("/schema", web::get().to(handle_schema)))
        .service(resource("/command", web::post().to(handle_command)))
        .service(resource(
            "/api/openai-functions",
            web::get().to(handle_openai_functions),
        ));
}

fn resource(path: &str, route: actix_web::Route) -> actix_web::Resource {
    web::resource(path)
        .route(route)
        .default_service(web::to(not_found))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn inbound_get(req: &HttpRequest) -> InboundRequest {
    let query = match req.query_string() {
        "" => None,
        q => Some(q.to_string()),
    };
    InboundRequest::get(req.path(), query)
}

async fn forward(state: &AppState, route: &Route, inbound: InboundRequest) -> HttpResponse {
    state
        .forwarder
        .forward(route, &inbound)
        .await
        .into_response()
}

async fn handle_info(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    forward(&state, &Route::INFO, inbound_get(&req)).await
}

async fn handle_tools(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    forward(&state, &Route::TOOLS, inbound_get(&req)).await
}

async fn handle_tool_detail(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    forward(&state, &Route::TOOL_DETAIL, inbound_get(&req)).await
}

async fn handle_schema(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    forward(&state, &Route::SCHEMA, inbound_get(&req)).await
}

async fn handle_command(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Bytes,
) -> HttpResponse {
    let body = if payload.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&payload) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "rejecting malformed command body");
                return HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "status": 400,
                    "message": "Invalid JSON body",
                    "error": {"code": "BAD_REQUEST", "message": e.to_string()},
                }));
            }
        }
    };
    forward(&state, &Route::COMMAND, InboundRequest::post(req.path(), body)).await
}

async fn handle_openai_functions(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let result = state
        .forwarder
        .forward(&Route::OPENAI_FUNCTIONS, &inbound_get(&req))
        .await;

    match result {
        NormalizedResult::Success { body, .. } => {
            let functions = translation::translate_tools(translation::extract_tool_list(&body));
            debug!(count = functions.len(), "translated NetPad tools to OpenAI functions");
            HttpResponse::Ok().json(functions)
        }
        other => other.into_response(),
    }
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    let method = req.method().as_str().to_string();
    let path = req.path().to_string();
    debug!(%method, %path, "no route matched");
    HttpResponse::NotFound().json(not_found_body(&method, &path))
}

/// Fixed payload for unmatched routes.
pub fn not_found_body(method: &str, path: &str) -> Value {
    json!({
        "success": false,
        "status": 404,
        "message": "Endpoint not found",
        "error": {
            "code": "NOT_FOUND",
            "message": format!("{} {} not found", method, path),
        },
    })
}
