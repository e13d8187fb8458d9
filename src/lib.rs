// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Teller
//!
//! This library provides a small in-memory banking ledger: per-account
//! balances plus an append-only transaction log, mutated only through atomic
//! deposit, withdrawal, and transfer operations.
//!
//! ## Core Components
//!
//! - [`Storage`]: Explicitly opened, shareable handle behind every service
//! - [`AccountStore`]: Account records with atomic balance deltas
//! - [`TransactionLog`]: Append-only entries, queryable per account
//! - [`LedgerService`]: Deposits, withdrawals, and all-or-nothing transfers
//! - [`AccountLifecycle`]: Account opening and atomic closure
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal_macros::dec;
//! use teller_rs::{
//!     AccountLifecycle, CustomerId, InMemoryDirectory, LedgerService, Storage, TransactionLog,
//! };
//!
//! let storage = Storage::open();
//! let directory = Arc::new(InMemoryDirectory::from_iter([CustomerId(1)]));
//! let lifecycle = AccountLifecycle::new(storage.clone(), directory);
//! let ledger = LedgerService::new(storage.clone());
//! let log = TransactionLog::new(storage.clone());
//!
//! let id = lifecycle.open(CustomerId(1), "Savings", dec!(100.00)).unwrap();
//! assert_eq!(ledger.deposit(id, dec!(50.00)).unwrap(), dec!(150.00));
//! assert_eq!(log.list_by_account(id).unwrap().len(), 1);
//!
//! storage.shutdown();
//! ```
//!
//! ## Thread Safety
//!
//! Every service takes `&self` and is `Send + Sync`; per-account locks
//! serialize writers on the same account while operations on different
//! accounts proceed in parallel.

pub mod account;
mod base;
pub mod error;
mod ledger;
mod lifecycle;
mod store;
mod transaction;
mod transaction_log;

pub use account::Account;
pub use base::{AccountId, CustomerId, TransactionId};
pub use error::LedgerError;
pub use ledger::{LedgerService, TransferReceipt};
pub use lifecycle::{AccountLifecycle, CustomerDirectory, InMemoryDirectory};
pub use store::{AccountStore, Storage};
pub use transaction::{TransactionEntry, TransactionKind};
pub use transaction_log::TransactionLog;
