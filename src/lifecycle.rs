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

//! Account lifecycle.
//!
//! Opening an account checks customer existence against an injected
//! directory; closing purges the account's transaction history and removes
//! the record as one unit, so no window exists where entries reference a
//! deleted account.

use crate::base::{AccountId, CustomerId};
use crate::error::LedgerError;
use crate::store::{AccountStore, Storage};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Customer existence check, consulted once per account opening.
pub trait CustomerDirectory: Send + Sync {
    fn exists(&self, customer_id: CustomerId) -> bool;
}

/// Directory backed by a fixed set of customer identifiers.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    customers: HashSet<CustomerId>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, customer_id: CustomerId) {
        self.customers.insert(customer_id);
    }
}

impl FromIterator<CustomerId> for InMemoryDirectory {
    fn from_iter<I: IntoIterator<Item = CustomerId>>(iter: I) -> Self {
        Self {
            customers: iter.into_iter().collect(),
        }
    }
}

impl CustomerDirectory for InMemoryDirectory {
    fn exists(&self, customer_id: CustomerId) -> bool {
        self.customers.contains(&customer_id)
    }
}

/// Opens and closes accounts.
#[derive(Clone)]
pub struct AccountLifecycle {
    storage: Storage,
    store: AccountStore,
    directory: Arc<dyn CustomerDirectory>,
    deadline: Option<Duration>,
}

impl AccountLifecycle {
    pub fn new(storage: Storage, directory: Arc<dyn CustomerDirectory>) -> Self {
        let store = AccountStore::new(storage.clone());
        Self {
            storage,
            store,
            directory,
            deadline: None,
        }
    }

    /// Bounds `close` by a deadline from its call; see
    /// [`LedgerService::with_deadline`](crate::LedgerService::with_deadline).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Opens an account for an existing customer and returns its identifier.
    pub fn open(
        &self,
        customer_id: CustomerId,
        account_type: &str,
        opening_balance: Decimal,
    ) -> Result<AccountId, LedgerError> {
        if !self.directory.exists(customer_id) {
            return Err(LedgerError::UnknownCustomer(customer_id));
        }
        self.store.create(customer_id, account_type, opening_balance)
    }

    /// Closes an account, purging its transaction history. Returns how many
    /// entries were purged.
    pub fn close(&self, account_id: AccountId) -> Result<usize, LedgerError> {
        let deadline = self.deadline.map(|deadline| Instant::now() + deadline);
        self.storage
            .close_account(account_id, deadline)?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}
