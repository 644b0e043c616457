pub mod config;
pub mod emoji;
pub mod error;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod pool;
pub mod routes;
pub mod sampler;
pub mod sidedata;
pub mod stats;
pub mod sweep;

use config::AppConfig;
use llm::LlmClient;
use orchestrator::Orchestrator;
use pool::AiWorkerPool;
use rocket_cors::CorsOptions;
use std::sync::Arc;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let config = AppConfig::from_env();
    build_rocket(config)
}

/// Build against an explicit config, bypassing the environment. Used by the
/// integration suite to isolate each test's scratch directory.
pub fn rocket_with_config(config: AppConfig) -> rocket::Rocket<rocket::Build> {
    build_rocket(config)
}

fn build_rocket(config: AppConfig) -> rocket::Rocket<rocket::Build> {
    std::fs::create_dir_all(&config.temp_dir_root).ok();

    let llm_client = Arc::new(LlmClient::new(&config));
    let pool = AiWorkerPool::spawn(config.max_concurrent_ai_calls, llm_client);
    let orchestrator = Orchestrator::new(pool.clone(), config.clone());

    let cors = CorsOptions::default().to_cors().expect("Failed to create CORS");

    let figment = rocket::Config::figment()
        .merge(("address", config.host.clone()))
        .merge(("port", config.port))
        .merge(("limits.file", config.max_upload_size_bytes()))
        .merge(("limits.data-form", config.max_upload_size_bytes()));

    let sweep_root = config.temp_dir_root.clone();
    let sweep_max_age = config.max_temp_file_age_secs;

    rocket::custom(figment)
        .manage(config)
        .manage(pool)
        .manage(orchestrator)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![
                routes::bad_request,
                routes::unauthorized,
                routes::payload_too_large,
                routes::too_many_requests,
                routes::internal_error,
                routes::gateway_timeout,
            ],
        )
        .mount("/", rocket::routes![routes::health::health, routes::analyze::analyze])
        .attach(rocket::fairing::AdHoc::on_liftoff("Upload Sweeper", move |_rocket| {
            Box::pin(async move {
                sweep::spawn(sweep_root, sweep_max_age);
                println!("🧹 Upload sweeper started");
            })
        }))
        .attach(rocket::fairing::AdHoc::on_shutdown("AI Worker Pool Drain", |rocket| {
            Box::pin(async move {
                if let Some(pool) = rocket.state::<Arc<AiWorkerPool>>() {
                    pool.shutdown(std::time::Duration::from_secs(pool::SHUTDOWN_DRAIN_SECS)).await;
                    println!("🛑 AI worker pool drained");
                }
            })
        }))
}
