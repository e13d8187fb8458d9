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

//! Append-only transaction log.
//!
//! Entries are stored inside the cell of the account they belong to, so an
//! entry can never reference an account that is not there, and an account's
//! entries vanish with it when it closes. Entries are appended under the
//! cell lock with identifiers and timestamps drawn inside the critical
//! section, so vector order and timestamp order coincide.

use crate::base::{AccountId, TransactionId};
use crate::error::LedgerError;
use crate::store::Storage;
use crate::transaction::{TransactionEntry, TransactionKind};
use rust_decimal::Decimal;
use std::time::Instant;

/// Append and query interface over per-account entries.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    storage: Storage,
}

impl TransactionLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Writes one immutable entry against an existing account and returns
    /// its identifier.
    pub fn append(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<TransactionId, LedgerError> {
        self.storage.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let cell = self.storage.cell(account_id)?;
        let mut state = cell.lock();
        if state.is_closed() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        let entry = TransactionEntry {
            transaction_id: self.storage.next_transaction_id(),
            account_id,
            kind,
            amount,
            timestamp: self.storage.next_commit_timestamp(),
        };
        let transaction_id = entry.transaction_id;
        state.push_entry(entry);
        Ok(transaction_id)
    }

    /// Returns the account's entries ordered by timestamp ascending. The
    /// result is a detached snapshot; it never observes later appends.
    pub fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.list_by(account_id, None)
    }

    pub(crate) fn list_by(
        &self,
        account_id: AccountId,
        deadline: Option<Instant>,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.storage.ensure_open()?;
        let cell = self.storage.cell(account_id)?;
        let state = cell.lock_by(deadline)?;
        if state.is_closed() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        Ok(state.entries().to_vec())
    }

    /// Purges every entry for the account and returns how many were removed.
    /// Unknown accounts purge nothing.
    pub fn delete_by_account(&self, account_id: AccountId) -> Result<usize, LedgerError> {
        self.storage.ensure_open()?;
        let Ok(cell) = self.storage.cell(account_id) else {
            return Ok(0);
        };
        let mut state = cell.lock();
        if state.is_closed() {
            return Ok(0);
        }
        Ok(state.drain_entries())
    }
}
