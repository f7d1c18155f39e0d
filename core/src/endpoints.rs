//! One method per Lunch Money endpoint.
//!
//! Arguments named `params` or `extra` accept anything that serializes to a
//! JSON object: a `serde_json::json!` literal, a `#[derive(Serialize)]`
//! struct, or `()` for nothing. Entries in `extra` override the fixed fields
//! a method fills in itself.

use chrono::{Duration, Local};
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{merge, to_value, truthy, LunchMoney};
use crate::error::ApiError;
use crate::http::{HttpMethod, Transport};

impl<T: Transport> LunchMoney<T> {
    fn get(&self, path: &str, params: impl Serialize) -> Result<Value, ApiError> {
        let params = to_value(params)?;
        self.query(HttpMethod::Get, path, Some(&params), None)
    }

    fn send(&self, method: HttpMethod, path: &str, body: Value) -> Result<Value, ApiError> {
        self.query(method, path, None, Some(&body))
    }

    /// All categories on the account.
    pub fn categories(&self, params: impl Serialize) -> Result<Value, ApiError> {
        let response = self.get("categories", params)?;
        take_field(response, "categories")
    }

    /// Create a category and return its id.
    pub fn create_category(&self, name: &str, extra: impl Serialize) -> Result<i64, ApiError> {
        let body = merge(json!({ "name": name }), extra)?;
        let response = self.send(HttpMethod::Post, "categories", body)?;
        as_id(&take_field(response, "category_id")?)
    }

    /// Transactions in a date range; with no range the API uses the
    /// current calendar month.
    pub fn transactions(&self, params: impl Serialize) -> Result<Value, ApiError> {
        let response = self.get("transactions", params)?;
        take_field(response, "transactions")
    }

    /// A single transaction by id.
    pub fn transaction(
        &self,
        id: i64,
        debit_as_negative: bool,
        extra: impl Serialize,
    ) -> Result<Value, ApiError> {
        let params = merge(json!({ "debit_as_negative": debit_as_negative }), extra)?;
        self.query(HttpMethod::Get, &format!("transactions/{id}"), Some(&params), None)
    }

    /// Insert many transactions at once; returns the new ids.
    ///
    /// Each transaction needs at least `date` and `amount`.
    pub fn create_transactions(
        &self,
        transactions: impl Serialize,
        extra: impl Serialize,
    ) -> Result<Vec<i64>, ApiError> {
        let transactions = to_value(transactions)?;
        let body = merge(json!({ "transactions": transactions }), extra)?;
        let response = self.send(HttpMethod::Post, "transactions", body)?;
        as_ids(&take_field(response, "ids")?)
    }

    /// Update (or split) one transaction.
    pub fn update_transaction(
        &self,
        id: i64,
        transaction: impl Serialize,
        extra: impl Serialize,
    ) -> Result<Value, ApiError> {
        let transaction = to_value(transaction)?;
        let body = merge(json!({ "transaction": transaction }), extra)?;
        self.send(HttpMethod::Put, &format!("transactions/{id}"), body)
    }

    /// Group two or more transactions; returns the id of the group.
    pub fn create_transaction_group(
        &self,
        date: &str,
        payee: &str,
        transactions: &[i64],
        extra: impl Serialize,
    ) -> Result<i64, ApiError> {
        let body = merge(
            json!({ "date": date, "payee": payee, "transactions": transactions }),
            extra,
        )?;
        let response = self.send(HttpMethod::Post, "transactions/group", body)?;
        as_id(&response)
    }

    /// Delete a transaction group. The grouped transactions survive; their
    /// ids are returned.
    pub fn delete_transaction_group(&self, id: i64) -> Result<Vec<i64>, ApiError> {
        let response = self.query(
            HttpMethod::Delete,
            &format!("transactions/group/{id}"),
            None,
            None,
        )?;
        as_ids(&take_field(response, "transactions")?)
    }

    pub fn tags(&self, params: impl Serialize) -> Result<Value, ApiError> {
        self.get("tags", params)
    }

    /// Recurring expenses expected for a period. An expense recurring twice
    /// a month is listed twice, once per expected billing date.
    pub fn recurring_expenses(&self, params: impl Serialize) -> Result<Value, ApiError> {
        self.get("recurring_expenses", params)
    }

    /// Budgets for all categories, aggregated over `start_date..=end_date`
    /// (`YYYY-MM-DD`). Missing or empty dates default to the last 30 days.
    pub fn budgets(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        extra: impl Serialize,
    ) -> Result<Value, ApiError> {
        let today = Local::now().date_naive();
        let start_date = start_date
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| (today - Duration::days(30)).to_string());
        let end_date = end_date
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| today.to_string());
        let params = merge(json!({ "start_date": start_date, "end_date": end_date }), extra)?;
        self.query(HttpMethod::Get, "budgets", Some(&params), None)
    }

    /// Set the budget for one category and month.
    pub fn upsert_budget(&self, body: impl Serialize) -> Result<Value, ApiError> {
        self.send(HttpMethod::Put, "budgets", to_value(body)?)
    }

    /// Unset the budget of `category_id` for `start_month` (`YYYY-MM`).
    pub fn delete_budget(&self, category_id: i64, start_month: &str) -> Result<bool, ApiError> {
        let params = json!({
            "start_date": format!("{start_month}-01"),
            "category_id": category_id.to_string(),
        });
        let response = self.query(HttpMethod::Delete, "budgets", Some(&params), None)?;
        Ok(truthy(&response))
    }

    /// Manually-managed assets.
    pub fn assets(&self, params: impl Serialize) -> Result<Value, ApiError> {
        let response = self.get("assets", params)?;
        take_field(response, "assets")
    }

    pub fn update_asset(&self, id: i64, fields: impl Serialize) -> Result<Value, ApiError> {
        self.send(HttpMethod::Put, &format!("assets/{id}"), to_value(fields)?)
    }

    /// Bank accounts synced through Plaid.
    pub fn plaid_accounts(&self, params: impl Serialize) -> Result<Value, ApiError> {
        let response = self.get("plaid_accounts", params)?;
        take_field(response, "plaid_accounts")
    }

    /// Crypto balances from both synced and manual accounts.
    pub fn crypto(&self, params: impl Serialize) -> Result<Value, ApiError> {
        let response = self.get("crypto", params)?;
        take_field(response, "crypto")
    }

    pub fn update_manual_crypto(&self, id: i64, fields: impl Serialize) -> Result<Value, ApiError> {
        self.send(HttpMethod::Put, &format!("crypto/manual/{id}"), to_value(fields)?)
    }
}

/// Unwrap the envelope key an endpoint wraps its payload in.
fn take_field(response: Value, key: &str) -> Result<Value, ApiError> {
    match response {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("missing `{key}` field"))),
        other => Err(ApiError::UnexpectedResponse(format!(
            "expected an object with `{key}`, got {other}"
        ))),
    }
}

/// Ids come back as numbers or numeric strings depending on the endpoint.
fn as_id(value: &Value) -> Result<i64, ApiError> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("expected an id, got {value}")))
}

fn as_ids(value: &Value) -> Result<Vec<i64>, ApiError> {
    value
        .as_array()
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("expected a list of ids, got {value}")))?
        .iter()
        .map(as_id)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_field_unwraps_envelope() {
        let list = take_field(json!({"tags": [1, 2]}), "tags").unwrap();
        assert_eq!(list, json!([1, 2]));
    }

    #[test]
    fn take_field_reports_missing_key() {
        let err = take_field(json!({"other": []}), "tags").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
        let err = take_field(json!([1]), "tags").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)));
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(as_ids(&json!([1, "2", 3])).unwrap(), vec![1, 2, 3]);
        assert!(as_ids(&json!(["x"])).is_err());
        assert!(as_id(&json!(null)).is_err());
    }
}
