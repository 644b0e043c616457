//! C7 — HTTP Surface: route table, request guards, and catchers.
//! See SPEC_FULL.md §4.7.

pub mod analyze;
pub mod health;

use crate::config::AppConfig;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;

/// Request guard enforcing `X-API-Key` when `VAL_API_KEY` is configured.
/// Modeled directly on the teacher's `AdminKey` guard: absent configuration
/// disables the check entirely (local/dev mode).
pub struct UploadGuard;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UploadGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<AppConfig>() else {
            return Outcome::Success(UploadGuard);
        };
        let Some(expected) = &config.val_api_key else {
            return Outcome::Success(UploadGuard);
        };
        match req.headers().get_one("X-API-Key") {
            Some(provided) if provided == expected => Outcome::Success(UploadGuard),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[rocket::catch(400)]
pub fn bad_request() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Bad request"}))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Missing or invalid API key"}))
}

#[rocket::catch(413)]
pub fn payload_too_large() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Upload exceeds the configured size limit"}))
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Too many requests"}))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Internal server error"}))
}

#[rocket::catch(504)]
pub fn gateway_timeout() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Analysis deadline exceeded"}))
}
