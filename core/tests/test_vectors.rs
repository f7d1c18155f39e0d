//! Verify every client call against JSON test vectors in `test-vectors/`.
//!
//! Each case names a call and its arguments, the request that must go out,
//! a simulated response, and the expected result or error. Comparing parsed
//! JSON (not raw strings) avoids false negatives from field ordering.

use std::cell::RefCell;

use lunchmoney_core::{
    ApiError, ClientConfig, HttpMethod, HttpRequest, HttpResponse, LunchMoney, Transport,
};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000";
const API_KEY: &str = "test-key";

/// Records requests and replays whichever response is queued next.
#[derive(Default)]
struct Recorder {
    requests: RefCell<Vec<HttpRequest>>,
    next: RefCell<Option<HttpResponse>>,
}

impl Transport for Recorder {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(self.next.borrow_mut().take().expect("no response queued"))
    }
}

fn client() -> LunchMoney<Recorder> {
    let config = ClientConfig::new().api_key(API_KEY).endpoint(BASE_URL);
    LunchMoney::with_transport(config, Recorder::default()).unwrap()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args[key].as_str().unwrap_or_else(|| panic!("missing string arg `{key}`"))
}

fn int_arg(args: &Value, key: &str) -> i64 {
    args[key].as_i64().unwrap_or_else(|| panic!("missing integer arg `{key}`"))
}

/// Dispatch a vector's `call` to the matching client method.
fn invoke(c: &LunchMoney<Recorder>, call: &str, args: &Value) -> Result<Value, ApiError> {
    match call {
        "categories" => c.categories(&args["params"]),
        "create_category" => c
            .create_category(str_arg(args, "name"), &args["extra"])
            .map(Value::from),
        "transactions" => c.transactions(&args["params"]),
        "transaction" => c.transaction(
            int_arg(args, "id"),
            args["debit_as_negative"].as_bool().unwrap(),
            &args["extra"],
        ),
        "create_transactions" => c
            .create_transactions(&args["transactions"], &args["extra"])
            .map(Value::from),
        "update_transaction" => {
            c.update_transaction(int_arg(args, "id"), &args["transaction"], &args["extra"])
        }
        "create_transaction_group" => {
            let ids: Vec<i64> = serde_json::from_value(args["transactions"].clone()).unwrap();
            c.create_transaction_group(
                str_arg(args, "date"),
                str_arg(args, "payee"),
                &ids,
                &args["extra"],
            )
            .map(Value::from)
        }
        "delete_transaction_group" => c
            .delete_transaction_group(int_arg(args, "id"))
            .map(Value::from),
        "tags" => c.tags(&args["params"]),
        "recurring_expenses" => c.recurring_expenses(&args["params"]),
        "budgets" => c.budgets(
            args["start_date"].as_str(),
            args["end_date"].as_str(),
            &args["extra"],
        ),
        "upsert_budget" => c.upsert_budget(&args["body"]),
        "delete_budget" => c
            .delete_budget(int_arg(args, "category_id"), str_arg(args, "start_month"))
            .map(Value::from),
        "assets" => c.assets(&args["params"]),
        "update_asset" => c.update_asset(int_arg(args, "id"), &args["fields"]),
        "plaid_accounts" => c.plaid_accounts(&args["params"]),
        "crypto" => c.crypto(&args["params"]),
        "update_manual_crypto" => c.update_manual_crypto(int_arg(args, "id"), &args["fields"]),
        "query" => c.query(
            parse_method(str_arg(args, "method")),
            str_arg(args, "path"),
            args.get("params"),
            args.get("body"),
        ),
        other => panic!("unknown call: {other}"),
    }
}

fn error_name(err: &ApiError) -> &'static str {
    match err {
        ApiError::MissingApiKey => "MissingApiKey",
        ApiError::Transport(_) => "Transport",
        ApiError::NotFound { .. } => "NotFound",
        ApiError::HttpError { .. } => "HttpError",
        ApiError::Remote(_) => "Remote",
        ApiError::SerializationError(_) => "SerializationError",
        ApiError::DeserializationError(_) => "DeserializationError",
        ApiError::InvalidParams(_) => "InvalidParams",
        ApiError::UnexpectedResponse(_) => "UnexpectedResponse",
    }
}

#[test]
fn endpoint_test_vectors() {
    let raw = include_str!("../../test-vectors/endpoints.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let c = client();

        let sim = &case["simulated_response"];
        *c.transport().next.borrow_mut() = Some(HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        });

        let result = invoke(&c, case["call"].as_str().unwrap(), &case["args"]);

        // Verify the request that went out
        let requests = c.transport().requests.borrow();
        assert_eq!(requests.len(), 1, "{name}: exactly one request");
        let req = &requests[0];
        let expected_req = &case["expected_request"];
        assert_eq!(
            req.method,
            parse_method(expected_req["method"].as_str().unwrap()),
            "{name}: method"
        );
        assert_eq!(
            req.url,
            format!("{BASE_URL}/v1{}", expected_req["path"].as_str().unwrap()),
            "{name}: url"
        );

        let expected_query: Vec<(String, String)> =
            serde_json::from_value(expected_req["query"].clone()).unwrap();
        assert_eq!(req.query, expected_query, "{name}: query");

        assert_eq!(
            req.header("authorization"),
            Some(format!("Bearer {API_KEY}").as_str()),
            "{name}: auth header"
        );

        match &expected_req["body"] {
            Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
            expected => {
                let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&sent, expected, "{name}: body");
            }
        }

        // Verify the parsed outcome
        if let Some(expected_error) = case.get("expected_error") {
            let err = result.expect_err(name);
            assert_eq!(error_name(&err), expected_error.as_str().unwrap(), "{name}: error kind");
        } else {
            let value = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
            assert_eq!(value, case["expected_result"], "{name}: parsed result");
        }
    }
}

#[test]
fn budgets_default_to_last_thirty_days() {
    for (start_date, end_date) in [(None, None), (Some(""), Some(""))] {
        let c = client();
        *c.transport().next.borrow_mut() = Some(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "[]".to_string(),
        });

        c.budgets(start_date, end_date, ()).unwrap();

        let requests = c.transport().requests.borrow();
        let query = &requests[0].query;
        assert_eq!(query[0].0, "start_date");
        assert_eq!(query[1].0, "end_date");
        let start = chrono::NaiveDate::parse_from_str(&query[0].1, "%Y-%m-%d").unwrap();
        let end = chrono::NaiveDate::parse_from_str(&query[1].1, "%Y-%m-%d").unwrap();
        assert_eq!((end - start).num_days(), 30, "{start_date:?}..{end_date:?}");
    }
}

#[test]
fn non_object_params_are_rejected_before_sending() {
    let c = client();
    let err = c.transactions(vec![1, 2, 3]).unwrap_err();
    assert!(matches!(err, ApiError::InvalidParams(_)));
    assert!(c.transport().requests.borrow().is_empty());
}
