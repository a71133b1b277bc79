//! # Health Monitoring
//!
//! `GET /health` and `GET /api/v1/health`: a JSON snapshot for load
//! balancers and humans.
//!
//! ## Reported:
//! - uptime and service identity
//! - session counters (accepted sockets, open sockets)
//! - trip counters (stored, accepted, rejected calls)
//! - the configured upstream model and voice
//!
//! The trip count is asked from the hub. If the hub is gone the endpoint
//! reports `503` instead of pretending to be healthy.

use crate::error::AppResult;
use crate::state::AppState;
use crate::trips::hub::CountTrips;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let stored_trips = state.trips.send(CountTrips).await?;
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "sessions": {
            "total": metrics.connections_total,
            "active": metrics.active_sessions
        },
        "trips": {
            "stored": stored_trips,
            "accepted": metrics.trips_accepted,
            "rejected": metrics.trips_rejected
        },
        "upstream": {
            "model": config.upstream.model,
            "voice": config.upstream.voice
        }
    })))
}
