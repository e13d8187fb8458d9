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

//! Ledger operations.
//!
//! Deposit, withdrawal, and transfer each commit a balance change together
//! with the log entry recording it inside one critical section, so no reader
//! ever observes one without the other. Transfers lock both accounts in
//! ascending identifier order and validate everything before the first
//! write, so any failure leaves zero side effects.

use crate::base::AccountId;
use crate::error::LedgerError;
use crate::store::Storage;
use crate::transaction::{TransactionEntry, TransactionKind};
use crate::transaction_log::TransactionLog;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Balances left by a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
}

/// Atomic money movement over a [`Storage`] handle.
///
/// The service is `Send + Sync`; clones share the underlying storage, and
/// every operation takes `&self`, so one instance can serve any number of
/// threads.
#[derive(Debug, Clone)]
pub struct LedgerService {
    storage: Storage,
    deadline: Option<Duration>,
}

impl LedgerService {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            deadline: None,
        }
    }

    /// Bounds every operation: if its locks cannot be acquired within
    /// `deadline` of the call, the operation fails with
    /// [`LedgerError::DeadlineExceeded`] and no state change.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn deadline_at(&self) -> Option<Instant> {
        self.deadline.map(|deadline| Instant::now() + deadline)
    }

    fn new_entry(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> TransactionEntry {
        TransactionEntry {
            transaction_id: self.storage.next_transaction_id(),
            account_id,
            kind,
            amount,
            timestamp: self.storage.next_commit_timestamp(),
        }
    }

    /// Credits `amount` to the account. Returns the new balance.
    pub fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.mutate(account_id, TransactionKind::Deposit, amount)
    }

    /// Debits `amount` from the account, rejecting any withdrawal that would
    /// drive the balance negative. Returns the new balance.
    pub fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.mutate(account_id, TransactionKind::Withdrawal, amount)
    }

    fn mutate(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<Decimal, LedgerError> {
        self.storage.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let cell = self.storage.cell(account_id)?;
        let mut state = cell.lock_by(self.deadline_at())?;
        if state.is_closed() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        let delta = if kind.is_credit() { amount } else { -amount };
        let balance = state.apply_delta(delta)?;
        state.push_entry(self.new_entry(account_id, kind, amount));
        debug!(account = %account_id, ?kind, %amount, %balance, "balance mutated");
        Ok(balance)
    }

    /// Moves `amount` between two accounts as one all-or-nothing unit.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        self.storage.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        let deadline = self.deadline_at();
        let source_cell = self.storage.cell(from)?;
        let destination_cell = self
            .storage
            .cell(to)
            .map_err(|_| LedgerError::DestinationNotFound(to))?;

        // Fixed total order: the lower account id locks first regardless of
        // transfer direction, so two opposing transfers contend on the same
        // first lock instead of deadlocking.
        let (mut source, mut destination) = if from < to {
            let source = source_cell.lock_by(deadline)?;
            let destination = destination_cell.lock_by(deadline)?;
            (source, destination)
        } else {
            let destination = destination_cell.lock_by(deadline)?;
            let source = source_cell.lock_by(deadline)?;
            (source, destination)
        };

        if source.is_closed() {
            return Err(LedgerError::AccountNotFound(from));
        }
        if destination.is_closed() {
            return Err(LedgerError::DestinationNotFound(to));
        }
        // Everything is validated before the first write, so a failed
        // transfer needs no rollback.
        if source.balance() < amount {
            return Err(LedgerError::InsufficientFunds);
        }

        let source_balance = source.apply_delta(-amount)?;
        let destination_balance = destination.apply_delta(amount)?;
        source.push_entry(self.new_entry(from, TransactionKind::TransferOut, amount));
        destination.push_entry(self.new_entry(to, TransactionKind::TransferIn, amount));
        debug!(source = %from, destination = %to, %amount, "transfer committed");

        Ok(TransferReceipt {
            source_balance,
            destination_balance,
        })
    }

    /// Returns the account's transaction history, oldest first.
    pub fn history(&self, account_id: AccountId) -> Result<Vec<TransactionEntry>, LedgerError> {
        TransactionLog::new(self.storage.clone()).list_by(account_id, self.deadline_at())
    }
}
