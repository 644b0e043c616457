use crate::pool::AiWorkerPool;
use rocket::serde::json::Json;
use rocket::State;
use std::sync::Arc;

/// `GET /health` — liveness and queue-depth probe. Never gated by the API key
/// so load balancers and uptime checks can hit it unauthenticated.
#[rocket::get("/health")]
pub fn health(pool: &State<Arc<AiWorkerPool>>) -> Json<crate::pool::HealthReport> {
    Json(pool.health())
}
