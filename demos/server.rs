//! Simple REST API server example for the banking ledger.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /accounts` - Open an account
//! - `GET /accounts` - List all accounts
//! - `GET /accounts/:id` - Get an account by ID
//! - `DELETE /accounts/:id` - Close an account, purging its history
//! - `POST /accounts/:id/deposits` - Deposit funds
//! - `POST /accounts/:id/withdrawals` - Withdraw funds
//! - `POST /transfers` - Transfer funds between two accounts
//! - `GET /accounts/:id/transactions` - Account history, oldest first
//!
//! ## Example Usage
//!
//! ```bash
//! # Open an account
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"customer_id": 1, "account_type": "Savings", "opening_balance": "100.00"}'
//!
//! # Deposit
//! curl -X POST http://localhost:3000/accounts/1/deposits \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": "50.00"}'
//!
//! # Transfer
//! curl -X POST http://localhost:3000/transfers \
//!   -H "Content-Type: application/json" \
//!   -d '{"from": 1, "to": 2, "amount": "25.00"}'
//!
//! # Account history
//! curl http://localhost:3000/accounts/1/transactions
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teller_rs::{
    Account, AccountId, AccountLifecycle, AccountStore, CustomerDirectory, CustomerId,
    LedgerError, LedgerService, Storage, TransactionKind,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

/// Request body for opening an account.
#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub customer_id: u32,
    pub account_type: String,
    pub opening_balance: Decimal,
}

/// Response body carrying a freshly assigned account identifier.
#[derive(Debug, Serialize)]
pub struct OpenAccountResponse {
    pub account_id: u32,
}

/// Request body for deposits and withdrawals.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

/// Response body carrying the balance after a deposit or withdrawal.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: u32,
    pub balance: Decimal,
}

/// Request body for transfers.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from: u32,
    pub to: u32,
    pub amount: Decimal,
}

/// Response body carrying both balances after a transfer.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
}

/// Response body for account information.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account: u32,
    pub customer: u32,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: Decimal,
}

/// Response body for one transaction log entry.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: u64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Response body reporting how many entries a closure purged.
#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub purged_entries: usize,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state: the ledger services over one storage handle.
#[derive(Clone)]
pub struct AppState {
    pub store: AccountStore,
    pub ledger: LedgerService,
    pub lifecycle: AccountLifecycle,
}

/// Demo directory that accepts every customer identifier.
struct AnyCustomer;

impl CustomerDirectory for AnyCustomer {
    fn exists(&self, _customer_id: CustomerId) -> bool {
        true
    }
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            LedgerError::DestinationNotFound(_) => {
                (StatusCode::NOT_FOUND, "DESTINATION_NOT_FOUND")
            }
            LedgerError::UnknownCustomer(_) => (StatusCode::NOT_FOUND, "UNKNOWN_CUSTOMER"),
            LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LedgerError::NegativeOpeningBalance => {
                (StatusCode::BAD_REQUEST, "NEGATIVE_OPENING_BALANCE")
            }
            LedgerError::SelfTransfer => (StatusCode::BAD_REQUEST, "SELF_TRANSFER"),
            LedgerError::InsufficientFunds => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
            }
            LedgerError::StorageUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
            }
            LedgerError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

fn account_response(account: Account) -> AccountResponse {
    AccountResponse {
        account: account.account_id.0,
        customer: account.customer_id.0,
        account_type: account.account_type,
        balance: account.balance,
    }
}

/// POST /accounts - Open a new account.
async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<OpenAccountResponse>), AppError> {
    let account_id = state.lifecycle.open(
        CustomerId(request.customer_id),
        &request.account_type,
        request.opening_balance,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(OpenAccountResponse {
            account_id: account_id.0,
        }),
    ))
}

/// GET /accounts - List all accounts.
async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = state
        .store
        .accounts()?
        .into_iter()
        .map(account_response)
        .collect();
    Ok(Json(accounts))
}

/// GET /accounts/:id - Get account by ID.
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.store.get(AccountId(id))?;
    Ok(Json(account_response(account)))
}

/// DELETE /accounts/:id - Close an account, purging its history.
async fn close_account(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<CloseResponse>, AppError> {
    let purged_entries = state.lifecycle.close(AccountId(id))?;
    Ok(Json(CloseResponse { purged_entries }))
}

/// POST /accounts/:id/deposits - Deposit funds.
async fn create_deposit(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.deposit(AccountId(id), request.amount)?;
    Ok(Json(BalanceResponse {
        account_id: id,
        balance,
    }))
}

/// POST /accounts/:id/withdrawals - Withdraw funds.
async fn create_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.ledger.withdraw(AccountId(id), request.amount)?;
    Ok(Json(BalanceResponse {
        account_id: id,
        balance,
    }))
}

/// POST /transfers - Transfer funds between two accounts.
async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    let receipt = state.ledger.transfer(
        AccountId(request.from),
        AccountId(request.to),
        request.amount,
    )?;
    Ok(Json(TransferResponse {
        source_balance: receipt.source_balance,
        destination_balance: receipt.destination_balance,
    }))
}

/// GET /accounts/:id/transactions - Account history, oldest first.
async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let entries = state.ledger.history(AccountId(id))?;
    let transactions = entries
        .into_iter()
        .map(|entry| TransactionResponse {
            transaction_id: entry.transaction_id.0,
            kind: entry.kind,
            amount: entry.amount,
            timestamp: entry.timestamp,
        })
        .collect();
    Ok(Json(transactions))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/accounts/{id}", get(get_account).delete(close_account))
        .route("/accounts/{id}/deposits", post(create_deposit))
        .route("/accounts/{id}/withdrawals", post(create_withdrawal))
        .route("/accounts/{id}/transactions", get(list_transactions))
        .route("/transfers", post(create_transfer))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let storage = Storage::open();
    let directory: Arc<dyn CustomerDirectory> = Arc::new(AnyCustomer);
    let state = AppState {
        store: AccountStore::new(storage.clone()),
        ledger: LedgerService::new(storage.clone()),
        lifecycle: AccountLifecycle::new(storage, directory),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Teller API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST   /accounts                   - Open an account");
    println!("  GET    /accounts                   - List all accounts");
    println!("  GET    /accounts/:id               - Get account by ID");
    println!("  DELETE /accounts/:id               - Close an account");
    println!("  POST   /accounts/:id/deposits      - Deposit funds");
    println!("  POST   /accounts/:id/withdrawals   - Withdraw funds");
    println!("  POST   /transfers                  - Transfer between accounts");
    println!("  GET    /accounts/:id/transactions  - Account history");

    axum::serve(listener, app).await.unwrap();
}
