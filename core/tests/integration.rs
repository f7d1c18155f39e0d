//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises the client over
//! real HTTP with the default ureq transport: a full read/write lifecycle,
//! authentication failure, an oversized response body, and a connection that
//! cannot be established.

use std::net::SocketAddr;

use lunchmoney_core::{ApiError, ClientConfig, HttpMethod, LunchMoney, UreqTransport};
use serde_json::json;

const TOKEN: &str = "integration-token";

/// Run the mock server on its own thread and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, TOKEN).await
        })
        .unwrap();
    });

    addr
}

fn client_for(addr: SocketAddr, api_key: &str) -> LunchMoney {
    let config = ClientConfig::new()
        .api_key(api_key)
        .endpoint(format!("http://{addr}"));
    LunchMoney::from_config(config).unwrap()
}

#[test]
fn read_write_lifecycle() {
    let addr = start_server();
    let client = client_for(addr, TOKEN);

    // Step 1: read-only lists.
    let categories = client.categories(()).unwrap();
    assert_eq!(categories.as_array().unwrap().len(), 2);

    let tags = client.tags(()).unwrap();
    assert_eq!(tags[0]["name"], "Vacation");

    let recurring = client.recurring_expenses(()).unwrap();
    assert_eq!(recurring["recurring_expenses"][0]["payee"], "Rent");

    let plaid = client.plaid_accounts(()).unwrap();
    assert_eq!(plaid[0]["type"], "depository");

    // Step 2: transactions in a date range come back unchanged.
    let january = client
        .transactions(json!({"start_date": "2020-01-01", "end_date": "2020-01-31"}))
        .unwrap();
    let january = january.as_array().unwrap();
    assert_eq!(january.len(), 2);
    assert_eq!(january[0]["payee"], "Corner Store");

    let tx = client.transaction(11, true, ()).unwrap();
    assert_eq!(tx["amount"], "-12.5000");

    // Step 3: create a category.
    let category_id = client
        .create_category("Coffee", json!({"description": "Beans and cafes"}))
        .unwrap();
    let categories = client.categories(()).unwrap();
    assert!(categories
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"] == category_id && c["name"] == "Coffee"));

    // Step 4: insert, update, group and ungroup transactions.
    let ids = client
        .create_transactions(
            json!([
                {"date": "2020-03-01", "amount": 4.5, "payee": "Cafe", "category_id": category_id},
                {"date": "2020-03-08", "amount": "3.25", "payee": "Cafe", "category_id": category_id}
            ]),
            (),
        )
        .unwrap();
    assert_eq!(ids.len(), 2);

    let updated = client
        .update_transaction(ids[0], json!({"notes": "oat milk"}), ())
        .unwrap();
    assert_eq!(updated["updated"], true);
    assert_eq!(client.transaction(ids[0], false, ()).unwrap()["notes"], "oat milk");

    let group_id = client
        .create_transaction_group("2020-03-08", "Cafe visits", &ids, ())
        .unwrap();
    let group = client.transaction(group_id, false, ()).unwrap();
    assert_eq!(group["is_group"], true);
    assert_eq!(group["amount"], "7.7500");

    let ungrouped = client.delete_transaction_group(group_id).unwrap();
    assert_eq!(ungrouped, ids);

    // Step 5: budgets.
    client
        .upsert_budget(json!({"start_date": "2020-03-01", "category_id": category_id, "amount": 40}))
        .unwrap();
    let budgets = client
        .budgets(Some("2020-03-01"), Some("2020-03-31"), ())
        .unwrap();
    assert_eq!(budgets.as_array().unwrap().len(), 1);
    assert!(client.delete_budget(category_id, "2020-03").unwrap());
    let err = client.delete_budget(category_id, "2020-03").unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));

    // Step 6: assets and crypto.
    let asset = client.update_asset(1, json!({"balance": 1250})).unwrap();
    assert_eq!(asset["balance"], "1250.0000");
    assert_eq!(client.assets(()).unwrap()[0]["balance"], "1250.0000");

    let coin = client
        .update_manual_crypto(1, json!({"balance": "0.75"}))
        .unwrap();
    assert_eq!(coin["balance"], "0.7500");
    let crypto = client.crypto(()).unwrap();
    assert_eq!(crypto.as_array().unwrap().len(), 2);

    // Step 7: escape hatch reaches the same routes.
    let raw = client.query(HttpMethod::Get, "/tags", None, None).unwrap();
    assert_eq!(raw, client.tags(()).unwrap());
}

#[test]
fn missing_resources_and_remote_errors_are_surfaced() {
    let addr = start_server();
    let client = client_for(addr, TOKEN);

    let err = client.transaction(424242, false, ()).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { ref body } if body.contains("Transaction not found")));

    let err = client.create_category(&"x".repeat(41), ()).unwrap_err();
    assert!(matches!(err, ApiError::Remote(ref m) if m.contains("40 characters")));
}

#[test]
fn wrong_api_key_is_rejected() {
    let addr = start_server();
    let client = client_for(addr, "not-the-token");

    let err = client.tags(()).unwrap_err();
    assert!(matches!(err, ApiError::HttpError { status: 401, .. }));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    // Reserve a port, then release it so nothing is listening there.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = client_for(addr, TOKEN);

    let err = client.categories(()).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[test]
fn body_over_limit_is_a_transport_error() {
    let addr = start_server();
    let config = ClientConfig::new()
        .api_key(TOKEN)
        .endpoint(format!("http://{addr}"));

    let small = LunchMoney::with_transport(config.clone(), UreqTransport::new().with_body_limit(16))
        .unwrap();
    let err = small.categories(()).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));

    let roomy = LunchMoney::with_transport(config, UreqTransport::new().with_body_limit(64 * 1024))
        .unwrap();
    assert_eq!(roomy.categories(()).unwrap().as_array().unwrap().len(), 2);
}
