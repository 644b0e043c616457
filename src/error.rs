use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;

/// The typed, non-panicking error surface for the request path (§7).
///
/// Subsystem failures are data, not exceptions: everything that can go wrong
/// while serving `POST /analyze/` is a variant here, each mapped to exactly one
/// HTTP status by the `Responder` impl below.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("missing or invalid filename: expected a non-empty .txt upload")]
    InvalidFilename,
    #[error("uploaded file is empty")]
    EmptyUpload,
    #[error("upload exceeds the configured size limit")]
    TooLarge,
    #[error("missing or invalid API key")]
    Unauthorized,
    #[error("could not read transcript stream: {0}")]
    ParserFatal(String),
    #[error("AI queue admission timed out")]
    AiQueueTimeout,
    #[error("analysis deadline exceeded")]
    AnalysisDeadline,
}

impl AnalysisError {
    fn status(&self) -> Status {
        match self {
            AnalysisError::InvalidFilename | AnalysisError::EmptyUpload => Status::BadRequest,
            AnalysisError::Unauthorized => Status::Unauthorized,
            AnalysisError::TooLarge => Status::PayloadTooLarge,
            AnalysisError::ParserFatal(_) => Status::InternalServerError,
            AnalysisError::AiQueueTimeout => Status::TooManyRequests,
            AnalysisError::AnalysisDeadline => Status::GatewayTimeout,
        }
    }
}

impl<'r> Responder<'r, 'static> for AnalysisError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}
