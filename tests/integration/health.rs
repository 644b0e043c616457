use crate::common::test_client;
use rocket::http::Status;

#[test]
fn health_reports_worker_capacity() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["ai_tasks_worker_capacity"], 1);
    assert_eq!(body["ai_tasks_processing"], 0);
}

#[test]
fn health_does_not_require_api_key() {
    let client = crate::common::test_client_with(|config| {
        config.val_api_key = Some("secret".to_string());
    });
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
}
