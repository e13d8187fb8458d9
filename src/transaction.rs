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

//! Ledger entries.
//!
//! Every balance change is recorded as one immutable [`TransactionEntry`].
//! Amounts are always positive; the direction of a movement is carried by
//! [`TransactionKind`], never by a negative amount.

use crate::base::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of balance movement an entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    /// Returns `true` for kinds that increase the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::TransferIn)
    }

    /// Returns `true` for kinds that decrease the balance.
    pub fn is_debit(&self) -> bool {
        !self.is_credit()
    }
}

/// One immutable row of the ledger.
///
/// Entries are written exactly once, in the same critical section as the
/// balance change they record, and are removed only by the whole-account
/// purge that account closure performs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionEntry {
    /// Assigned monotonically by the store at commit time.
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Strictly positive; direction comes from `kind`.
    pub amount: Decimal,
    /// Assigned at commit time; strictly increasing per store instance.
    pub timestamp: DateTime<Utc>,
}

impl TransactionEntry {
    /// Amount with its direction applied: credits positive, debits negative.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
