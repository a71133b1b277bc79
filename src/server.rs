//! # HTTP Server Assembly
//!
//! Routes and middleware for the relay, shared by `main` and the
//! end-to-end tests.
//!
//! ## Routes:
//! - `GET /ws`: WebSocket upgrade, one relay session per socket
//! - `GET /health`, `GET /api/v1/health`: health snapshot
//! - `GET /api/v1/trips`: every accepted trip
//!
//! ## Middleware (outermost first):
//! CORS, `TracingLogger` (one span per request), `RequestLogging`.

use crate::error::{AppError, AppResult};
use crate::middleware::RequestLogging;
use crate::state::AppState;
use crate::{handlers, health, websocket};
use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing_actix_web::TracingLogger;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/trips", web::get().to(handlers::list_trips)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/ws", web::get().to(websocket::relay_websocket));
}

async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::NotFound(format!("no route for {} {}", req.method(), req.path())))
}

/// Bind the HTTP server. The returned future must be awaited (or spawned)
/// to serve; the addresses are the ones actually bound, which matters when
/// binding port 0.
pub fn bind(state: AppState, addr: &str) -> Result<(Server, Vec<SocketAddr>)> {
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(RequestLogging)
            .wrap(TracingLogger::default())
            .wrap(cors)
            .configure(routes)
            .default_service(web::to(not_found))
    })
    .bind(addr)
    .with_context(|| format!("Failed to bind {}", addr))?;

    let addrs = server.addrs();
    Ok((server.run(), addrs))
}
