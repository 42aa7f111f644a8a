use greenlight_e2e_tests::spawn_server;
use serde_json::{Value, json};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_health() {
    let server = spawn_server("server_health", &["--env", "staging"])
        .await
        .unwrap();
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "available",
            "system_info": {"environment": "staging", "version": greenlight_app::VERSION}
        })
    );
}

#[tokio::test]
#[traced_test]
async fn test_unknown_route() {
    let server = spawn_server("server_unknown_route", &[]).await.unwrap();
    let client = reqwest::Client::new();

    let response = client.get(server.url("v2/movies")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "the requested resource could not be found");

    let response = client
        .post(server.url("v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 405);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "the POST method is not supported for this resource"
    );
}
