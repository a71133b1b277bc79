//! Read-only view of the stored trips.

use crate::error::AppResult;
use crate::state::AppState;
use crate::trips::hub::GetTrips;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /api/v1/trips`: every accepted trip in acceptance order.
pub async fn list_trips(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let trips = state.trips.send(GetTrips).await?;

    Ok(HttpResponse::Ok().json(json!({
        "count": trips.len(),
        "trips": trips,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
