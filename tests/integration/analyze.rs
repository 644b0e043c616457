use crate::common::{test_client, test_client_with};
use rocket::http::{ContentType, Header, Status};

const BOUNDARY: &str = "chatlens-test-boundary";

fn multipart_body(filename: &str, content: &str) -> (ContentType, Vec<u8>) {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    let ct = ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY));
    (ct, body.into_bytes())
}

const SAMPLE_CHAT: &str = "2/3/24, 09:00 - Alice: good morning everyone how is it going\n\
2/3/24, 09:05 - Bob: pretty good thanks for asking about my weekend\n\
2/3/24, 09:10 - Alice: glad to hear that friend\n";

#[test]
fn analyze_accepts_a_transcript_and_returns_statistics() {
    let client = test_client();
    let (ct, body) = multipart_body("chat.txt", SAMPLE_CHAT);
    let res = client.post("/analyze/").header(ct).body(body).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let parsed: serde_json::Value = res.into_json().unwrap();
    assert_eq!(parsed["chat_name"], "Alice & Bob");
    assert!(parsed["stats"]["user_message_count"]["Alice"].as_u64().unwrap() >= 1);
}

#[test]
fn analyze_rejects_non_txt_extension() {
    let client = test_client();
    let (ct, body) = multipart_body("chat.pdf", SAMPLE_CHAT);
    let res = client.post("/analyze/").header(ct).body(body).dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn analyze_rejects_empty_upload() {
    let client = test_client();
    let (ct, body) = multipart_body("chat.txt", "");
    let res = client.post("/analyze/").header(ct).body(body).dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn analyze_requires_api_key_when_configured() {
    let client = test_client_with(|config| {
        config.val_api_key = Some("topsecret".to_string());
    });
    let (ct, body) = multipart_body("chat.txt", SAMPLE_CHAT);
    let res = client.post("/analyze/").header(ct).body(body).dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn analyze_accepts_matching_api_key() {
    let client = test_client_with(|config| {
        config.val_api_key = Some("topsecret".to_string());
    });
    let (ct, body) = multipart_body("chat.txt", SAMPLE_CHAT);
    let res = client
        .post("/analyze/")
        .header(ct)
        .header(Header::new("X-API-Key", "topsecret"))
        .body(body)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn analyze_reports_empty_result_for_no_messages() {
    let client = test_client();
    let (ct, body) = multipart_body("chat.txt", "not a transcript at all\njust plain text\n");
    let res = client.post("/analyze/").header(ct).body(body).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let parsed: serde_json::Value = res.into_json().unwrap();
    assert!(parsed["error"].as_str().unwrap().contains("No messages found"));
}
