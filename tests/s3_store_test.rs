use ig_scraper::app::ports::ObjectStore;
use ig_scraper::error::SinkError;
use ig_scraper::infra::s3::S3Store;
use ig_scraper::infra::sigv4::{sha256_hex, SigningKey};
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key() -> SigningKey {
    SigningKey {
        access_key_id: "AKIDEXAMPLE".into(),
        secret_access_key: "secret".into(),
        region: "us-east-1".into(),
        service: "s3".into(),
    }
}

#[tokio::test]
async fn puts_signed_object_at_bucket_path() {
    let server = MockServer::start().await;
    let body = r#"[{"Status":"OK"}]"#;
    Mock::given(method("PUT"))
        .and(path("/snapshots/instagram1697414400/1697445000_output.json"))
        .and(header("x-amz-content-sha256", sha256_hex(body.as_bytes()).as_str()))
        .and(header("content-type", "application/json"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("authorization"))
        .and(body_string(body))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = S3Store::new(reqwest::Client::new(), &server.uri(), "snapshots", key()).unwrap();
    store
        .put_object(
            "instagram1697414400/1697445000_output.json",
            body.as_bytes().to_vec(),
            "application/json",
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
}

#[tokio::test]
async fn rejected_put_is_an_upload_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("SignatureDoesNotMatch"))
        .mount(&server)
        .await;

    let store = S3Store::new(reqwest::Client::new(), &server.uri(), "snapshots", key()).unwrap();
    let err = store
        .put_object("k.json", b"{}".to_vec(), "application/json")
        .await
        .unwrap_err();

    match err {
        SinkError::Upload { key, message } => {
            assert_eq!(key, "k.json");
            assert!(message.contains("403"));
            assert!(message.contains("SignatureDoesNotMatch"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn endpoint_must_be_a_url() {
    assert!(S3Store::new(reqwest::Client::new(), "not a url", "b", key()).is_err());
}
