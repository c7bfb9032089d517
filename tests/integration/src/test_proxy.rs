//! Proxy behavior over real HTTP, against the fake table store.

use reqwest::StatusCode;
use serde_json::Value;

use crate::{FakeStore, Proxy, client};

const GET_ITEM: &str = r#"{"TableName":"users","Key":{"id":{"S":"1"}}}"#;

#[tokio::test]
async fn test_should_report_status_with_listen_port() {
    let (_store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;

    let resp = client().get(proxy.url("/Status")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["server"], "dynaproxy");
    let value: Value = resp.json().await.unwrap();
    assert_eq!(value["Name"], "Status");
    assert_eq!(value["Body"]["Status"], "ready");
    assert_eq!(
        value["Body"]["ListenPort"].as_u64(),
        proxy.runtime.listen_port.get().map(u64::from)
    );

    proxy.stop().await;
}

#[tokio::test]
async fn test_should_relay_direct_and_compat_requests_identically() {
    let (store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;
    let http = client();

    let direct = http
        .post(proxy.url("/GetItem?compact=1"))
        .body(GET_ITEM)
        .send()
        .await
        .unwrap();
    assert_eq!(direct.status(), StatusCode::OK);
    let direct = direct.bytes().await.unwrap();

    let compat = http
        .post(proxy.url("/?compact=1"))
        .header("X-Amz-Target", "DynamoDB_20120810.GetItem")
        .header("Content-Type", "application/x-amz-json-1.0")
        .body(GET_ITEM)
        .send()
        .await
        .unwrap();
    assert_eq!(compat.status(), StatusCode::OK);
    assert_eq!(direct, compat.bytes().await.unwrap());

    let calls = store.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.target == "DynamoDB_20120810.GetItem"));
    assert!(calls.iter().all(|c| c.body.as_ref() == GET_ITEM.as_bytes()));

    proxy.stop().await;
}

#[tokio::test]
async fn test_should_wrap_response_in_envelope() {
    let (_store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;

    let resp = client()
        .post(proxy.url("/GetItem/"))
        .body(GET_ITEM)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-dynaproxy-requestid"));
    let value: Value = resp.json().await.unwrap();
    assert_eq!(value["Name"], "GetItem");
    assert_eq!(value["StatusCode"], 200);
    assert_eq!(value["Body"]["Item"]["name"]["S"], "ada");
    assert!(value["Run"]["ElapsedMs"].is_u64());

    proxy.stop().await;
}

#[tokio::test]
async fn test_should_forward_store_errors_unchanged() {
    let (_store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;

    let resp = client()
        .get(proxy.url("/DescribeTable/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let value: Value = resp.json().await.unwrap();
    assert!(
        value["__type"]
            .as_str()
            .unwrap()
            .ends_with("ResourceNotFoundException")
    );

    proxy.stop().await;
}

#[tokio::test]
async fn test_should_reject_bad_compat_requests_without_calling_store() {
    let (store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;
    let http = client();

    let resp = http
        .post(proxy.url("/"))
        .header("X-Amz-Target", "9.9.Bogus")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = http.post(proxy.url("/")).body("{}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = http
        .post(proxy.url("/"))
        .header("X-Amz-Target", "DynamoDB_20120810.DeleteTable")
        .body(r#"{"TableName":"users"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(store.calls().is_empty());
    proxy.stop().await;
}

#[tokio::test]
async fn test_should_poll_table_status_through_compat() {
    let (store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;

    let resp = client()
        .post(proxy.url("/"))
        .header("X-Amz-Target", "DynamoDB_20120810.StatusTable/")
        .body(r#"{"TableName":"users"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value: Value = resp.json().await.unwrap();
    assert_eq!(value["Name"], "StatusTable");
    assert_eq!(value["Body"]["Table"]["TableStatus"], "ACTIVE");
    assert_eq!(store.calls()[0].target, "DynamoDB_20120810.DescribeTable");

    proxy.stop().await;
}

#[tokio::test]
async fn test_should_install_delete_table_only_when_enabled() {
    let (store, store_url) = FakeStore::spawn().await;

    let proxy = Proxy::start(&store_url, false).await;
    let resp = client()
        .post(proxy.url("/DeleteTable"))
        .body(r#"{"TableName":"users"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    proxy.stop().await;

    let proxy = Proxy::start(&store_url, true).await;
    let resp = client()
        .post(proxy.url("/DeleteTable"))
        .body(r#"{"TableName":"users"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.calls().len(), 1);
    proxy.stop().await;
}

#[tokio::test]
async fn test_should_refuse_requests_after_shutdown_begins() {
    let (store, store_url) = FakeStore::spawn().await;
    let proxy = Proxy::start(&store_url, false).await;
    proxy.runtime.gate.close();

    let resp = client()
        .post(proxy.url("/ListTables"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(store.calls().is_empty());

    proxy.stop().await;
}
