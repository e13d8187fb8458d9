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

//! Storage handle and account store.
//!
//! Accounts live in a sharded concurrent map of `Arc`-shared cells. Lookups
//! clone the `Arc` out of the map and release the shard before locking the
//! cell, so map access never nests inside a cell lock.

use crate::account::{Account, AccountCell, AccountState};
use crate::base::{AccountId, CustomerId, TransactionId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct StorageInner {
    accounts: DashMap<AccountId, Arc<AccountCell>>,
    /// Next surrogate key. Only ever incremented, so identifiers are never
    /// reused even after an account is deleted.
    next_account_id: AtomicU32,
    next_transaction_id: AtomicU64,
    /// Microsecond timestamp of the most recent commit.
    last_commit_micros: AtomicI64,
    open: AtomicBool,
}

/// Handle to the in-memory store behind every service.
///
/// A `Storage` is opened explicitly, cloned freely (clones share state), and
/// handed to each service that uses it. After [`Storage::shutdown`] every
/// operation fails fast with [`LedgerError::StorageUnavailable`].
#[derive(Debug, Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Storage {
    pub fn open() -> Self {
        Self {
            inner: Arc::new(StorageInner {
                accounts: DashMap::new(),
                next_account_id: AtomicU32::new(1),
                next_transaction_id: AtomicU64::new(1),
                last_commit_micros: AtomicI64::new(0),
                open: AtomicBool::new(true),
            }),
        }
    }

    /// Marks the store unavailable. In-flight operations finish; new ones
    /// fail fast.
    pub fn shutdown(&self) {
        self.inner.open.store(false, Ordering::Release);
        debug!("storage shut down");
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LedgerError::StorageUnavailable)
        }
    }

    /// Clones the cell for `account_id` out of the map. The shard reference
    /// is released before this returns; callers lock the cell afterwards.
    pub(crate) fn cell(&self, account_id: AccountId) -> Result<Arc<AccountCell>, LedgerError> {
        self.inner
            .accounts
            .get(&account_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    pub(crate) fn cells(&self) -> Vec<Arc<AccountCell>> {
        self.inner
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub(crate) fn insert_account(
        &self,
        customer_id: CustomerId,
        account_type: &str,
        opening_balance: Decimal,
    ) -> AccountId {
        let account_id = AccountId(self.inner.next_account_id.fetch_add(1, Ordering::Relaxed));
        let state = AccountState::new(
            account_id,
            customer_id,
            account_type.to_string(),
            opening_balance,
        );
        self.inner
            .accounts
            .insert(account_id, Arc::new(AccountCell::new(state)));
        account_id
    }

    /// Closes an account: tombstone, entry purge, and map removal happen
    /// under the cell lock, so no operation can slip in between them.
    ///
    /// Returns the number of purged entries, or `None` if the account does
    /// not exist (or another closer won the race).
    pub(crate) fn close_account(
        &self,
        account_id: AccountId,
        deadline: Option<Instant>,
    ) -> Result<Option<usize>, LedgerError> {
        self.ensure_open()?;
        let Ok(cell) = self.cell(account_id) else {
            return Ok(None);
        };
        let mut state = cell.lock_by(deadline)?;
        if state.is_closed() {
            return Ok(None);
        }
        state.mark_closed();
        let purged = state.drain_entries();
        self.inner.accounts.remove(&account_id);
        drop(state);
        debug!(account = %account_id, purged, "account closed");
        Ok(Some(purged))
    }

    pub(crate) fn next_transaction_id(&self) -> TransactionId {
        TransactionId(self.inner.next_transaction_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Timestamp for the next commit, strictly greater than every timestamp
    /// handed out before. Wall clocks can stall or step backwards; entry
    /// order must not.
    pub(crate) fn next_commit_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let mut last = self.inner.last_commit_micros.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.inner.last_commit_micros.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now);
                }
                Err(observed) => last = observed,
            }
        }
    }
}

/// Account CRUD over a [`Storage`] handle.
#[derive(Debug, Clone)]
pub struct AccountStore {
    storage: Storage,
}

impl AccountStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Creates an account and returns its identifier.
    pub fn create(
        &self,
        customer_id: CustomerId,
        account_type: &str,
        opening_balance: Decimal,
    ) -> Result<AccountId, LedgerError> {
        self.storage.ensure_open()?;
        if opening_balance < Decimal::ZERO {
            return Err(LedgerError::NegativeOpeningBalance);
        }
        let account_id = self
            .storage
            .insert_account(customer_id, account_type, opening_balance);
        debug!(account = %account_id, customer = %customer_id, %opening_balance, "account created");
        Ok(account_id)
    }

    pub fn get(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.storage.ensure_open()?;
        let cell = self.storage.cell(account_id)?;
        let state = cell.lock();
        if state.is_closed() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(state.snapshot())
    }

    /// Adjusts the balance by a signed delta. Read, check, and write happen
    /// under the account's lock; a delta that would take the balance below
    /// zero is rejected with the balance untouched.
    pub fn apply_delta(
        &self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.storage.ensure_open()?;
        let cell = self.storage.cell(account_id)?;
        let mut state = cell.lock();
        if state.is_closed() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        state.apply_delta(delta)
    }

    /// Deletes an account, purging its entries first. Returns whether an
    /// account was deleted; deleting an unknown identifier is not an error.
    pub fn delete(&self, account_id: AccountId) -> Result<bool, LedgerError> {
        Ok(self.storage.close_account(account_id, None)?.is_some())
    }

    /// Snapshots every account, ordered by identifier.
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.storage.ensure_open()?;
        let mut accounts: Vec<Account> = self
            .storage
            .cells()
            .iter()
            .filter_map(|cell| {
                let state = cell.lock();
                (!state.is_closed()).then(|| state.snapshot())
            })
            .collect();
        accounts.sort_by_key(|account| account.account_id);
        Ok(accounts)
    }
}
