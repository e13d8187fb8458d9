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

//! Account state.
//!
//! Each account lives in an [`AccountCell`]: a mutex around the balance and
//! the account's slice of the transaction log, so a balance change and the
//! entry recording it commit in one critical section.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use teller_rs::{AccountStore, CustomerId, Storage};
//!
//! let storage = Storage::open();
//! let store = AccountStore::new(storage);
//! let id = store.create(CustomerId(1), "Savings", dec!(100.00)).unwrap();
//! assert_eq!(store.get(id).unwrap().balance, dec!(100.00));
//! ```

use crate::base::{AccountId, CustomerId};
use crate::error::LedgerError;
use crate::transaction::TransactionEntry;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::time::Instant;

#[derive(Debug)]
pub(crate) struct AccountState {
    account_id: AccountId,
    customer_id: CustomerId,
    account_type: String,
    balance: Decimal,
    /// This account's entries, oldest first.
    entries: Vec<TransactionEntry>,
    /// Tombstone. Set under the cell lock when the account is closed, so a
    /// writer that raced the close and got the lock afterwards can tell the
    /// account is gone.
    closed: bool,
}

impl AccountState {
    pub(crate) fn new(
        account_id: AccountId,
        customer_id: CustomerId,
        account_type: String,
        opening_balance: Decimal,
    ) -> Self {
        let state = Self {
            account_id,
            customer_id,
            account_type,
            balance: opening_balance,
            entries: Vec::new(),
            closed: false,
        };
        state.assert_invariants();
        state
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
        debug_assert!(
            self.entries
                .iter()
                .all(|entry| entry.amount > Decimal::ZERO),
            "Invariant violated: non-positive entry amount"
        );
    }

    /// Adjusts the balance by a signed delta, rejecting any result below
    /// zero. Returns the new balance.
    pub(crate) fn apply_delta(&mut self, delta: Decimal) -> Result<Decimal, LedgerError> {
        let next = self.balance + delta;
        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance = next;
        self.assert_invariants();
        Ok(next)
    }

    pub(crate) fn push_entry(&mut self, entry: TransactionEntry) {
        debug_assert_eq!(entry.account_id, self.account_id);
        self.entries.push(entry);
        self.assert_invariants();
    }

    /// Removes every entry and returns how many were purged.
    pub(crate) fn drain_entries(&mut self) -> usize {
        let purged = self.entries.len();
        self.entries.clear();
        purged
    }

    pub(crate) fn entries(&self) -> &[TransactionEntry] {
        &self.entries
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Point-in-time copy for callers outside the critical section.
    pub(crate) fn snapshot(&self) -> Account {
        Account {
            account_id: self.account_id,
            customer_id: self.customer_id,
            account_type: self.account_type.clone(),
            balance: self.balance,
        }
    }
}

/// Mutex-wrapped account state shared through the store.
///
/// Callers clone the `Arc<AccountCell>` out of the store's map and lock the
/// cell afterwards; the map shard is never held across a cell lock.
#[derive(Debug)]
pub(crate) struct AccountCell {
    inner: Mutex<AccountState>,
}

impl AccountCell {
    pub(crate) fn new(state: AccountState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountState> {
        self.inner.lock()
    }

    /// Locks the cell, giving up at `deadline` if one is set.
    pub(crate) fn lock_by(
        &self,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'_, AccountState>, LedgerError> {
        match deadline {
            Some(at) => self
                .inner
                .try_lock_until(at)
                .ok_or(LedgerError::DeadlineExceeded),
            None => Ok(self.inner.lock()),
        }
    }
}

/// Point-in-time view of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub account_type: String,
    pub balance: Decimal,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 4)?;
        state.serialize_field("account", &self.account_id)?;
        state.serialize_field("customer", &self.customer_id)?;
        state.serialize_field("type", &self.account_type)?;
        state.serialize_field(
            "balance",
            &self.balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
