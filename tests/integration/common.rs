use chatlens::config::AppConfig;
use rocket::local::blocking::Client;
use std::sync::OnceLock;

/// Background workers spawned while building the `Rocket` instance need a
/// live Tokio reactor to attach to; keep one runtime alive for the whole
/// test binary rather than letting it drop after each build.
fn build_runtime() -> &'static tokio::runtime::Runtime {
    static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| tokio::runtime::Runtime::new().expect("tokio runtime"))
}

/// Wrapper around `Client` that removes its scratch upload directory on drop.
pub struct TestClient {
    client: Option<Client>,
    temp_dir: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_dir_all(&self.temp_dir);
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

pub fn test_client() -> TestClient {
    test_client_with(|_| {})
}

pub fn test_client_with(customize: impl FnOnce(&mut AppConfig)) -> TestClient {
    let temp_dir = format!(
        "/tmp/chatlens_test_{}",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );

    let mut config = AppConfig {
        temp_dir_root: temp_dir.clone(),
        port: 0,
        max_concurrent_ai_calls: 1,
        analysis_timeout_secs: 30,
        ai_queue_timeout_secs: 2,
        ..AppConfig::default()
    };
    customize(&mut config);

    let rocket = build_runtime().block_on(async { chatlens::rocket_with_config(config) });
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), temp_dir }
}
