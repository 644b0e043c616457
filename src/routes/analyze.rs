use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::models::AnalysisResult;
use crate::orchestrator::Orchestrator;
use crate::routes::UploadGuard;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;

#[derive(rocket::form::FromForm)]
pub struct UploadForm<'r> {
    file: TempFile<'r>,
}

/// `POST /analyze/` — accepts a multipart `file` field holding an exported
/// chat transcript, runs the full parse/statistics/AI pipeline, and returns
/// the composed result. No true multipart crate is pulled in: Rocket's own
/// `TempFile` + `FromForm` machinery already does this natively.
#[rocket::post("/analyze", data = "<form>")]
pub async fn analyze(
    config: &State<AppConfig>,
    orchestrator: &State<Orchestrator>,
    _guard: UploadGuard,
    mut form: Form<UploadForm<'_>>,
) -> Result<Json<AnalysisResult>, AnalysisError> {
    let original_name = form
        .file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_default();

    if !original_name.to_lowercase().ends_with(".txt") {
        return Err(AnalysisError::InvalidFilename);
    }

    let size = form.file.len();
    if size == 0 {
        return Err(AnalysisError::EmptyUpload);
    }
    if size > config.max_upload_size_bytes() {
        return Err(AnalysisError::TooLarge);
    }

    let scratch_path = std::path::Path::new(&config.temp_dir_root)
        .join(format!("{}-{original_name}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&config.temp_dir_root)
        .map_err(|e| AnalysisError::ParserFatal(e.to_string()))?;
    form.file
        .persist_to(&scratch_path)
        .await
        .map_err(|e| AnalysisError::ParserFatal(e.to_string()))?;

    let bytes = std::fs::read(&scratch_path).map_err(|e| AnalysisError::ParserFatal(e.to_string()))?;
    std::fs::remove_file(&scratch_path).ok();

    let result = orchestrator.analyze(&original_name, bytes).await?;
    Ok(Json(result))
}
