use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_income: bool,
    pub exclude_from_budget: bool,
    pub exclude_from_totals: bool,
    pub is_group: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_income: bool,
    #[serde(default)]
    pub exclude_from_budget: bool,
    #[serde(default)]
    pub exclude_from_totals: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: String,
    pub payee: String,
    pub amount: String,
    pub currency: String,
    pub notes: Option<String>,
    pub category_id: Option<i64>,
    pub status: String,
    pub is_group: bool,
    pub group_id: Option<i64>,
}

/// One entry of a bulk insert. `amount` may be a number or a string.
#[derive(Debug, Deserialize)]
pub struct NewTransaction {
    pub date: String,
    pub amount: Value,
    #[serde(default)]
    pub payee: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InsertTransactions {
    pub transactions: Vec<NewTransaction>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionPatch {
    pub date: Option<String>,
    pub payee: Option<String>,
    pub amount: Option<Value>,
    pub notes: Option<String>,
    pub category_id: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransaction {
    pub transaction: TransactionPatch,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub date: String,
    pub payee: String,
    pub transactions: Vec<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecurringExpense {
    pub id: i64,
    pub payee: String,
    pub amount: String,
    pub currency: String,
    pub billing_date: String,
    pub cadence: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    pub category_id: i64,
    pub start_date: String,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBudget {
    pub start_date: String,
    pub category_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub type_name: String,
    pub name: String,
    pub balance: String,
    pub currency: String,
    pub institution_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssetPatch {
    pub type_name: Option<String>,
    pub name: Option<String>,
    pub balance: Option<Value>,
    pub currency: Option<String>,
    pub institution_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaidAccount {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
    pub balance: String,
    pub currency: String,
    pub institution_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Crypto {
    /// Only manual entries carry an id.
    pub id: Option<i64>,
    pub source: String,
    pub name: String,
    pub display_name: Option<String>,
    pub balance: String,
    pub currency: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CryptoPatch {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub balance: Option<Value>,
    pub currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionOptions {
    #[serde(default)]
    pub debit_as_negative: bool,
}

#[derive(Debug, Deserialize)]
pub struct BudgetKey {
    pub start_date: String,
    pub category_id: i64,
}

/// Everything the mock account holds.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
    pub tags: Vec<Tag>,
    pub recurring_expenses: Vec<RecurringExpense>,
    pub budgets: Vec<Budget>,
    pub assets: Vec<Asset>,
    pub plaid_accounts: Vec<PlaidAccount>,
    pub crypto: Vec<Crypto>,
    next_id: i64,
}

impl Ledger {
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
            transactions: Vec::new(),
            tags: Vec::new(),
            recurring_expenses: Vec::new(),
            budgets: Vec::new(),
            assets: Vec::new(),
            plaid_accounts: Vec::new(),
            crypto: Vec::new(),
            next_id: 100,
        }
    }

    /// A small fixed account used by tests and the standalone binary.
    pub fn seeded() -> Self {
        let category = |id, name: &str, is_income| Category {
            id,
            name: name.to_string(),
            description: None,
            is_income,
            exclude_from_budget: false,
            exclude_from_totals: false,
            is_group: false,
        };
        let transaction = |id, date: &str, payee: &str, amount: &str, category_id| Transaction {
            id,
            date: date.to_string(),
            payee: payee.to_string(),
            amount: amount.to_string(),
            currency: "usd".to_string(),
            notes: None,
            category_id: Some(category_id),
            status: "cleared".to_string(),
            is_group: false,
            group_id: None,
        };

        Self {
            categories: vec![category(1, "Groceries", false), category(2, "Salary", true)],
            transactions: vec![
                transaction(11, "2020-01-05", "Corner Store", "12.5000", 1),
                transaction(12, "2020-01-20", "Employer", "-2500.0000", 2),
                transaction(13, "2020-02-03", "Corner Store", "8.2500", 1),
            ],
            tags: vec![
                Tag {
                    id: 1,
                    name: "Vacation".to_string(),
                    description: None,
                },
                Tag {
                    id: 2,
                    name: "Reimbursable".to_string(),
                    description: Some("Claim from work".to_string()),
                },
            ],
            recurring_expenses: vec![RecurringExpense {
                id: 1,
                payee: "Rent".to_string(),
                amount: "1200.0000".to_string(),
                currency: "usd".to_string(),
                billing_date: "2020-01-01".to_string(),
                cadence: "monthly".to_string(),
            }],
            budgets: vec![Budget {
                category_id: 1,
                start_date: "2020-01-01".to_string(),
                amount: 300.0,
                currency: "usd".to_string(),
            }],
            assets: vec![Asset {
                id: 1,
                type_name: "investment".to_string(),
                name: "Brokerage".to_string(),
                balance: "1000.0000".to_string(),
                currency: "usd".to_string(),
                institution_name: Some("Vanguard".to_string()),
            }],
            plaid_accounts: vec![PlaidAccount {
                id: 1,
                name: "Checking".to_string(),
                kind: "depository".to_string(),
                subtype: "checking".to_string(),
                balance: "523.1200".to_string(),
                currency: "usd".to_string(),
                institution_name: "First Bank".to_string(),
            }],
            crypto: vec![
                Crypto {
                    id: Some(1),
                    source: "manual".to_string(),
                    name: "Bitcoin".to_string(),
                    display_name: Some("BTC".to_string()),
                    balance: "0.5000".to_string(),
                    currency: "btc".to_string(),
                },
                Crypto {
                    id: None,
                    source: "synced".to_string(),
                    name: "Ethereum".to_string(),
                    display_name: None,
                    balance: "2.0000".to_string(),
                    currency: "eth".to_string(),
                },
            ],
            next_id: 100,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

pub type Db = Arc<RwLock<Ledger>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub api_key: Arc<str>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{what} not found") })))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Render a number or numeric string as the API's 4-decimal amount string.
fn amount_string(value: &Value) -> Option<String> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(format!("{amount:.4}"))
}

fn in_range(date: &str, range: &DateRange) -> bool {
    range.start_date.as_deref().map_or(true, |start| date >= start)
        && range.end_date.as_deref().map_or(true, |end| date <= end)
}

pub fn app(api_key: &str) -> Router {
    app_with_ledger(api_key, Ledger::seeded())
}

pub fn app_with_ledger(api_key: &str, ledger: Ledger) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(ledger)),
        api_key: Arc::from(api_key),
    };
    let api = Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/transactions", get(list_transactions).post(insert_transactions))
        .route("/transactions/group", post(create_group))
        .route("/transactions/group/{id}", delete(delete_group))
        .route("/transactions/{id}", get(get_transaction).put(update_transaction))
        .route("/tags", get(list_tags))
        .route("/recurring_expenses", get(list_recurring_expenses))
        .route(
            "/budgets",
            get(list_budgets).put(upsert_budget).delete(delete_budget),
        )
        .route("/assets", get(list_assets))
        .route("/assets/{id}", put(update_asset))
        .route("/plaid_accounts", get(list_plaid_accounts))
        .route("/crypto", get(list_crypto))
        .route("/crypto/manual/{id}", put(update_manual_crypto))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));
    Router::new().nest("/v1", api).with_state(state)
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    info!(method = %request.method(), uri = %request.uri(), "request");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.api_key);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Access token does not exist." })),
        )
            .into_response();
    }
    next.run(request).await
}

async fn list_categories(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "categories": ledger.categories }))
}

/// Validation failures come back with status 200 and an `error` list, as
/// the real API does for this route.
async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> Json<Value> {
    let length = input.name.chars().count();
    if !(1..=40).contains(&length) {
        return Json(json!({ "error": ["Name must be between 1 and 40 characters"] }));
    }
    let mut ledger = state.db.write().await;
    let id = ledger.allocate_id();
    ledger.categories.push(Category {
        id,
        name: input.name,
        description: input.description,
        is_income: input.is_income,
        exclude_from_budget: input.exclude_from_budget,
        exclude_from_totals: input.exclude_from_totals,
        is_group: false,
    });
    Json(json!({ "category_id": id }))
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> Json<Value> {
    let ledger = state.db.read().await;
    let transactions: Vec<&Transaction> = ledger
        .transactions
        .iter()
        .filter(|tx| in_range(&tx.date, &range))
        .collect();
    Json(json!({ "transactions": transactions }))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(options): Query<TransactionOptions>,
) -> ApiResult<Transaction> {
    let ledger = state.db.read().await;
    let mut tx = ledger
        .transactions
        .iter()
        .find(|tx| tx.id == id)
        .cloned()
        .ok_or_else(|| not_found("Transaction"))?;
    if options.debit_as_negative {
        if let Some(negated) = tx.amount.parse::<f64>().ok().map(|a| format!("{:.4}", -a)) {
            tx.amount = negated;
        }
    }
    Ok(Json(tx))
}

/// All-or-nothing: every entry is validated before any is stored.
async fn insert_transactions(
    State(state): State<AppState>,
    Json(input): Json<InsertTransactions>,
) -> ApiResult<Value> {
    let amounts = input
        .transactions
        .iter()
        .map(|new| amount_string(&new.amount).ok_or_else(|| bad_request("Invalid amount")))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ledger = state.db.write().await;
    let mut ids = Vec::with_capacity(amounts.len());
    for (new, amount) in input.transactions.into_iter().zip(amounts) {
        let id = ledger.allocate_id();
        ledger.transactions.push(Transaction {
            id,
            date: new.date,
            payee: new.payee.unwrap_or_default(),
            amount,
            currency: new.currency.unwrap_or_else(|| "usd".to_string()),
            notes: new.notes,
            category_id: new.category_id,
            status: new.status.unwrap_or_else(|| "uncleared".to_string()),
            is_group: false,
            group_id: None,
        });
        ids.push(id);
    }
    Ok(Json(json!({ "ids": ids })))
}

async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTransaction>,
) -> ApiResult<Value> {
    let mut ledger = state.db.write().await;
    let tx = ledger
        .transactions
        .iter_mut()
        .find(|tx| tx.id == id)
        .ok_or_else(|| not_found("Transaction"))?;
    let patch = input.transaction;
    if let Some(amount) = patch.amount {
        tx.amount = amount_string(&amount).ok_or_else(|| bad_request("Invalid amount"))?;
    }
    if let Some(date) = patch.date {
        tx.date = date;
    }
    if let Some(payee) = patch.payee {
        tx.payee = payee;
    }
    if let Some(notes) = patch.notes {
        tx.notes = Some(notes);
    }
    if let Some(category_id) = patch.category_id {
        tx.category_id = Some(category_id);
    }
    if let Some(status) = patch.status {
        tx.status = status;
    }
    Ok(Json(json!({ "updated": true })))
}

/// Responds with the bare id of the new group transaction.
async fn create_group(
    State(state): State<AppState>,
    Json(input): Json<CreateGroup>,
) -> ApiResult<i64> {
    let mut members = input.transactions;
    members.sort_unstable();
    members.dedup();
    if members.len() < 2 {
        return Err(bad_request("A group needs at least two transactions"));
    }
    let mut ledger = state.db.write().await;
    let mut total = 0.0;
    for id in &members {
        let tx = ledger
            .transactions
            .iter()
            .find(|tx| tx.id == *id)
            .ok_or_else(|| not_found("Transaction"))?;
        if tx.is_group || tx.group_id.is_some() {
            return Err(bad_request("Transaction is already part of a group"));
        }
        total += tx.amount.parse::<f64>().unwrap_or(0.0);
    }
    let group_id = ledger.allocate_id();
    for tx in ledger.transactions.iter_mut() {
        if members.contains(&tx.id) {
            tx.group_id = Some(group_id);
        }
    }
    ledger.transactions.push(Transaction {
        id: group_id,
        date: input.date,
        payee: input.payee,
        amount: format!("{total:.4}"),
        currency: "usd".to_string(),
        notes: input.notes,
        category_id: input.category_id,
        status: "cleared".to_string(),
        is_group: true,
        group_id: None,
    });
    Ok(Json(group_id))
}

async fn delete_group(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let mut ledger = state.db.write().await;
    let position = ledger
        .transactions
        .iter()
        .position(|tx| tx.id == id && tx.is_group)
        .ok_or_else(|| not_found("Transaction group"))?;
    ledger.transactions.remove(position);
    let mut ungrouped = Vec::new();
    for tx in ledger.transactions.iter_mut() {
        if tx.group_id == Some(id) {
            tx.group_id = None;
            ungrouped.push(tx.id);
        }
    }
    Ok(Json(json!({ "transactions": ungrouped })))
}

async fn list_tags(State(state): State<AppState>) -> Json<Vec<Tag>> {
    Json(state.db.read().await.tags.clone())
}

async fn list_recurring_expenses(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "recurring_expenses": ledger.recurring_expenses }))
}

async fn list_budgets(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> ApiResult<Vec<Budget>> {
    if range.start_date.is_none() || range.end_date.is_none() {
        return Err(bad_request("start_date and end_date are required"));
    }
    let ledger = state.db.read().await;
    let budgets = ledger
        .budgets
        .iter()
        .filter(|b| in_range(&b.start_date, &range))
        .cloned()
        .collect();
    Ok(Json(budgets))
}

async fn upsert_budget(
    State(state): State<AppState>,
    Json(input): Json<UpsertBudget>,
) -> Json<Budget> {
    let mut ledger = state.db.write().await;
    let budget = Budget {
        category_id: input.category_id,
        start_date: input.start_date,
        amount: input.amount,
        currency: input.currency.unwrap_or_else(|| "usd".to_string()),
    };
    match ledger
        .budgets
        .iter_mut()
        .find(|b| b.category_id == budget.category_id && b.start_date == budget.start_date)
    {
        Some(existing) => *existing = budget.clone(),
        None => ledger.budgets.push(budget.clone()),
    }
    Json(budget)
}

async fn delete_budget(
    State(state): State<AppState>,
    Query(key): Query<BudgetKey>,
) -> ApiResult<bool> {
    let mut ledger = state.db.write().await;
    let before = ledger.budgets.len();
    ledger
        .budgets
        .retain(|b| !(b.category_id == key.category_id && b.start_date == key.start_date));
    if ledger.budgets.len() == before {
        return Err(not_found("Budget"));
    }
    Ok(Json(true))
}

async fn list_assets(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "assets": ledger.assets }))
}

async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<AssetPatch>,
) -> ApiResult<Asset> {
    let mut ledger = state.db.write().await;
    let asset = ledger
        .assets
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| not_found("Asset"))?;
    if let Some(balance) = patch.balance {
        asset.balance = amount_string(&balance).ok_or_else(|| bad_request("Invalid balance"))?;
    }
    if let Some(type_name) = patch.type_name {
        asset.type_name = type_name;
    }
    if let Some(name) = patch.name {
        asset.name = name;
    }
    if let Some(currency) = patch.currency {
        asset.currency = currency;
    }
    if let Some(institution_name) = patch.institution_name {
        asset.institution_name = Some(institution_name);
    }
    Ok(Json(asset.clone()))
}

async fn list_plaid_accounts(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "plaid_accounts": ledger.plaid_accounts }))
}

async fn list_crypto(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.db.read().await;
    Json(json!({ "crypto": ledger.crypto }))
}

async fn update_manual_crypto(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<CryptoPatch>,
) -> ApiResult<Crypto> {
    let mut ledger = state.db.write().await;
    let entry = ledger
        .crypto
        .iter_mut()
        .find(|c| c.source == "manual" && c.id == Some(id))
        .ok_or_else(|| not_found("Manual crypto asset"))?;
    if let Some(balance) = patch.balance {
        entry.balance = amount_string(&balance).ok_or_else(|| bad_request("Invalid balance"))?;
    }
    if let Some(name) = patch.name {
        entry.name = name;
    }
    if let Some(display_name) = patch.display_name {
        entry.display_name = Some(display_name);
    }
    if let Some(currency) = patch.currency {
        entry.currency = currency;
    }
    Ok(Json(entry.clone()))
}
