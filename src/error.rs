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

//! Error types for ledger operations.

use crate::base::{AccountId, CustomerId};
use thiserror::Error;

/// Ledger operation errors.
///
/// Every operation returns its full outcome as a typed result; nothing is
/// swallowed or retried inside the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account does not exist (or has been closed)
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    /// Transfer destination account does not exist
    #[error("destination account {0} not found")]
    DestinationNotFound(AccountId),

    /// Account owner is not present in the customer directory
    #[error("customer {0} not found")]
    UnknownCustomer(CustomerId),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Opening balance is negative
    #[error("invalid opening balance (must not be negative)")]
    NegativeOpeningBalance,

    /// Transfer names the same account on both sides
    #[error("transfer source and destination are the same account")]
    SelfTransfer,

    /// Debit would drive the balance below zero
    #[error("insufficient available funds")]
    InsufficientFunds,

    /// Storage handle has been shut down
    #[error("storage unavailable")]
    StorageUnavailable,

    /// Operation deadline expired before all locks were acquired
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}
