use std::str::FromStr;
use std::sync::Arc;

use ledgerd_api::app::{build_app, AppServices};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, backed by the in-memory store, on an ephemeral port.
        let app = build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn dec(v: &Value) -> Decimal {
    Decimal::from_str(v.as_str().expect("decimal serialized as string")).unwrap()
}

async fn create_account(client: &reqwest::Client, srv: &TestServer, name: &str, balance: Value) -> String {
    let res = client
        .post(srv.url("/accounts"))
        .json(&json!({ "name": name, "initialBalance": balance }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn get_account(client: &reqwest::Client, srv: &TestServer, id: &str) -> Value {
    let res = client
        .get(srv.url(&format!("/accounts/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["data"].clone()
}

async fn post(client: &reqwest::Client, srv: &TestServer, path: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(srv.url(path)).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn unknown_route_is_a_plain_404() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/nope")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Not found" }));
}

#[tokio::test]
async fn account_lifecycle_create_list_get() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let first = create_account(&client, &srv, "Alice", json!(100)).await;
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let second = create_account(&client, &srv, "Bob", json!("12.50")).await;

    let res = client.get(srv.url("/accounts")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    let bob = get_account(&client, &srv, &second).await;
    assert_eq!(bob["name"], "Bob");
    assert_eq!(dec(&bob["balance"]), Decimal::new(125, 1));
    assert!(bob["createdAt"].as_str().is_some());
    assert_eq!(bob["entries"], json!([]));
}

#[tokio::test]
async fn create_account_validates_input() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, &srv, "/accounts", json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    let (status, body) = post(
        &client,
        &srv,
        "/accounts",
        json!({ "name": "Neg", "initialBalance": -5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");

    let res = client
        .post(srv.url("/accounts"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn lookup_of_unknown_account_is_404() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for id in ["0190b8a0-0000-7000-8000-000000000000", "not-a-uuid"] {
        let res = client
            .get(srv.url(&format!("/accounts/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{id}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["code"], "ACCOUNT_NOT_FOUND");
    }
}

#[tokio::test]
async fn withdraw_and_deposit_return_transaction_and_account() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = create_account(&client, &srv, "Alice", json!(100)).await;

    let (status, body) = post(
        &client,
        &srv,
        &format!("/accounts/{id}/withdraw"),
        json!({ "amount": 25.5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(dec(&body["data"]["account"]["balance"]), Decimal::new(745, 1));
    assert_eq!(
        body["data"]["transaction"]["description"],
        format!("Withdrawal from {id}")
    );

    let (status, body) = post(
        &client,
        &srv,
        &format!("/accounts/{id}/deposit"),
        json!({ "amount": "0.5" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["data"]["account"]["balance"]), Decimal::from(75));

    let account = get_account(&client, &srv, &id).await;
    let entries = account["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["type"], "CREDIT");
    assert_eq!(entries[1]["type"], "DEBIT");
    assert_eq!(entries[1]["transaction"]["description"], format!("Withdrawal from {id}"));
}

#[tokio::test]
async fn invalid_movements_leave_state_unchanged() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = create_account(&client, &srv, "Alice", json!(10)).await;

    for amount in [json!(0), json!(-1), json!("-0.01")] {
        let (status, body) = post(
            &client,
            &srv,
            &format!("/accounts/{id}/withdraw"),
            json!({ "amount": amount }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
    }

    let (status, body) = post(&client, &srv, &format!("/accounts/{id}/withdraw"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    let (status, body) = post(
        &client,
        &srv,
        &format!("/accounts/{id}/withdraw"),
        json!({ "amount": 11 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["error"]["message"], "Insufficient funds");

    let (status, body) = post(
        &client,
        &srv,
        "/accounts/0190b8a0-0000-7000-8000-000000000000/withdraw",
        json!({ "amount": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ACCOUNT_NOT_FOUND");

    let (status, body) = post(
        &client,
        &srv,
        "/accounts/garbage/deposit",
        json!({ "amount": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");

    let account = get_account(&client, &srv, &id).await;
    assert_eq!(dec(&account["balance"]), Decimal::from(10));
    assert_eq!(account["entries"], json!([]));
}

#[tokio::test]
async fn deposit_past_the_decimal_range_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let max = Decimal::MAX.to_string();
    let id = create_account(&client, &srv, "Max", json!(max)).await;

    let (status, body) = post(
        &client,
        &srv,
        &format!("/accounts/{id}/deposit"),
        json!({ "amount": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");

    let account = get_account(&client, &srv, &id).await;
    assert_eq!(dec(&account["balance"]), Decimal::MAX);
    assert_eq!(account["entries"], json!([]));
}

#[tokio::test]
async fn transfer_moves_funds_between_accounts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = create_account(&client, &srv, "A", json!(50)).await;
    let b = create_account(&client, &srv, "B", json!(0)).await;

    let (status, body) = post(
        &client,
        &srv,
        "/accounts/transfer",
        json!({ "from": a, "to": b, "amount": 30, "description": "rent" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["transaction"]["description"], "rent");
    let tx_id = body["data"]["transaction"]["id"].as_str().unwrap().to_string();

    let from = get_account(&client, &srv, &a).await;
    let to = get_account(&client, &srv, &b).await;
    assert_eq!(dec(&from["balance"]), Decimal::from(20));
    assert_eq!(dec(&to["balance"]), Decimal::from(30));

    let debit = &from["entries"][0];
    let credit = &to["entries"][0];
    assert_eq!(debit["type"], "DEBIT");
    assert_eq!(credit["type"], "CREDIT");
    assert_eq!(debit["transactionId"], tx_id);
    assert_eq!(credit["transactionId"], tx_id);
    assert_eq!(dec(&debit["amount"]), dec(&credit["amount"]));
}

#[tokio::test]
async fn failed_transfers_change_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = create_account(&client, &srv, "A", json!(10)).await;
    let b = create_account(&client, &srv, "B", json!(0)).await;

    let cases = [
        (json!({ "from": a, "to": b, "amount": 11 }), "INSUFFICIENT_FUNDS"),
        (json!({ "from": a, "to": a, "amount": 1 }), "INVALID_REQUEST"),
        (json!({ "from": a, "to": b }), "INVALID_REQUEST"),
        (json!({ "from": a, "to": b, "amount": 0 }), "INVALID_AMOUNT"),
        (
            json!({ "from": a, "to": "0190b8a0-0000-7000-8000-000000000000", "amount": 1 }),
            "ACCOUNT_NOT_FOUND",
        ),
        (json!({ "from": "garbage", "to": b, "amount": 1 }), "ACCOUNT_NOT_FOUND"),
        (json!({ "from": "", "to": "", "amount": 5 }), "INVALID_REQUEST"),
        (json!({ "from": a, "to": "  ", "amount": 5 }), "INVALID_REQUEST"),
        (json!({ "from": "garbage", "to": b, "amount": 0 }), "INVALID_AMOUNT"),
    ];

    for (payload, code) in cases {
        let (status, body) = post(&client, &srv, "/accounts/transfer", payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["error"]["code"], code, "{payload}");
    }

    let from = get_account(&client, &srv, &a).await;
    let to = get_account(&client, &srv, &b).await;
    assert_eq!(dec(&from["balance"]), Decimal::from(10));
    assert_eq!(dec(&to["balance"]), Decimal::ZERO);
    assert_eq!(from["entries"], json!([]));
    assert_eq!(to["entries"], json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn fifty_concurrent_withdrawals_never_overdraw() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = create_account(&client, &srv, "Stress", json!(100)).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let client = client.clone();
        let url = srv.url(&format!("/accounts/{id}/withdraw"));
        handles.push(tokio::spawn(async move {
            let res = client
                .post(url)
                .json(&json!({ "amount": 10 }))
                .send()
                .await
                .unwrap();
            let status = res.status();
            let body: Value = res.json().await.unwrap();
            (status, body)
        }));
    }

    let mut succeeded = 0;
    let mut insufficient = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        match status {
            StatusCode::OK => succeeded += 1,
            StatusCode::BAD_REQUEST => {
                assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");
                insufficient += 1;
            }
            other => panic!("unexpected status {other}: {body}"),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(insufficient, 40);

    let account = get_account(&client, &srv, &id).await;
    assert_eq!(dec(&account["balance"]), Decimal::ZERO);
    assert_eq!(account["entries"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, srv.url("/accounts"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["access-control-max-age"], "86400");
}
